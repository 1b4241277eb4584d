//! Sub-document operations for PostgreSQL database.
//!
//! Every sub-document type shares the `sub_documents` table; the domain fields are stored as
//! JSONB in `body` and the type in `doc_type`.  A partial unique index on
//! `(species_id, doc_type)` keeps single-valued types unique per species.

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};

use crate::DataStoreError;
use crate::kind::SubDocumentKind;
use crate::species::{Attachments, SpeciesId};
use crate::subdocument::{SubDocument, SubDocumentBody, SubDocumentId};

/// Result type for database operations.
pub type SqlResult<T> = Result<T, DataStoreError>;

const COLUMNS: &str = "id, doc_type, species_id, owner, date_of_creation, last_update, body";

fn decode_kind(raw: &str) -> SqlResult<SubDocumentKind> {
    raw.parse()
        .map_err(|e: crate::kind::UnknownKind| DataStoreError::Internal(e.to_string()))
}

fn decode(row: &PgRow) -> SqlResult<SubDocument> {
    let doc_type: String = row.try_get("doc_type")?;
    let kind = decode_kind(&doc_type)?;
    let body: serde_json::Value = row.try_get("body")?;
    Ok(SubDocument {
        id: SubDocumentId(row.try_get("id")?),
        species: SpeciesId(row.try_get("species_id")?),
        owner: row.try_get("owner")?,
        date_of_creation: row.try_get("date_of_creation")?,
        last_update: row.try_get("last_update")?,
        body: SubDocumentBody::from_value(kind, body)?,
    })
}

/// Inserts a sub-document and returns it with its new identifier.
///
/// # Returns
/// * `Err(DataStoreError::AlreadyExists)` - The species already holds one of this type
pub async fn create(
    tx: &mut Transaction<'_, Postgres>,
    document: &SubDocument,
) -> SqlResult<SubDocument> {
    let body = serde_json::to_value(&document.body)?;
    let row = sqlx::query(
        r#"
        INSERT INTO sub_documents (doc_type, species_id, owner, date_of_creation, last_update, body)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(document.kind().as_str())
    .bind(document.species.get())
    .bind(document.owner.as_deref())
    .bind(document.date_of_creation)
    .bind(document.last_update)
    .bind(body)
    .fetch_one(&mut **tx)
    .await?;
    Ok(SubDocument {
        id: SubDocumentId(row.try_get("id")?),
        ..document.clone()
    })
}

/// Retrieves a sub-document of type `kind`.
pub async fn get(
    tx: &mut Transaction<'_, Postgres>,
    kind: SubDocumentKind,
    id: SubDocumentId,
) -> SqlResult<Option<SubDocument>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sub_documents WHERE id = $1 AND doc_type = $2",
        COLUMNS
    ))
    .bind(id.get())
    .bind(kind.as_str())
    .fetch_optional(&mut **tx)
    .await?;
    row.as_ref().map(decode).transpose()
}

/// Overwrites a sub-document, possibly re-pointing it at another species.
///
/// # Returns
/// * `Err(DataStoreError::NotFound)` - No such sub-document
/// * `Err(DataStoreError::AlreadyExists)` - The new species already holds one of this type
pub async fn update(tx: &mut Transaction<'_, Postgres>, document: &SubDocument) -> SqlResult<()> {
    let body = serde_json::to_value(&document.body)?;
    let result = sqlx::query(
        r#"
        UPDATE sub_documents
        SET species_id = $3, owner = $4, last_update = $5, body = $6
        WHERE id = $1 AND doc_type = $2
        "#,
    )
    .bind(document.id.get())
    .bind(document.kind().as_str())
    .bind(document.species.get())
    .bind(document.owner.as_deref())
    .bind(document.last_update)
    .bind(body)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DataStoreError::NotFound);
    }
    Ok(())
}

/// Deletes a sub-document of type `kind`.
pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    kind: SubDocumentKind,
    id: SubDocumentId,
) -> SqlResult<bool> {
    let result = sqlx::query("DELETE FROM sub_documents WHERE id = $1 AND doc_type = $2")
        .bind(id.get())
        .bind(kind.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Every sub-document pointing at `species`, oldest first.
pub async fn list_for_species(
    tx: &mut Transaction<'_, Postgres>,
    species: SpeciesId,
) -> SqlResult<Vec<SubDocument>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sub_documents WHERE species_id = $1 ORDER BY id",
        COLUMNS
    ))
    .bind(species.get())
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(decode).collect()
}

/// Derives the attachments of each species in `species` from the back-references.
pub async fn attachments(
    tx: &mut Transaction<'_, Postgres>,
    species: &[SpeciesId],
) -> SqlResult<HashMap<SpeciesId, Attachments>> {
    let mut out: HashMap<SpeciesId, Attachments> = HashMap::new();
    if species.is_empty() {
        return Ok(out);
    }
    let ids: Vec<i64> = species.iter().map(|s| s.get()).collect();
    let rows = sqlx::query(
        "SELECT id, doc_type, species_id FROM sub_documents WHERE species_id = ANY($1) ORDER BY id",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await?;
    for row in rows {
        let doc_type: String = row.try_get("doc_type")?;
        let owner = SpeciesId(row.try_get("species_id")?);
        out.entry(owner)
            .or_default()
            .attach(decode_kind(&doc_type)?, SubDocumentId(row.try_get("id")?));
    }
    Ok(out)
}
