//! Species operations for PostgreSQL database.
//!
//! Attachments are not stored on the species row.  Functions that return species fill them in
//! from the `sub_documents` back-references.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row, Transaction};

use crate::data_store::{Page, SortDirection, SortField, SpeciesQuery};
use crate::kind::Kind;
use crate::species::{Attachments, Species, SpeciesId, ValidationState};
use crate::visibility::VisibilityPredicate;
use crate::{DataStoreError, sql::sub_document};

/// Result type for database operations.
pub type SqlResult<T> = Result<T, DataStoreError>;

const COLUMNS: &str = "s.id, s.kind, s.validation_state, s.owner, s.date_of_creation, s.last_update";

fn decode_state(raw: &str) -> SqlResult<ValidationState> {
    ValidationState::ALL
        .into_iter()
        .find(|s| s.as_str() == raw)
        .ok_or_else(|| DataStoreError::Internal(format!("unknown validation state {:?}", raw)))
}

fn decode(row: &PgRow) -> SqlResult<Species> {
    let kind: String = row.try_get("kind")?;
    let state: String = row.try_get("validation_state")?;
    Ok(Species {
        id: SpeciesId(row.try_get("id")?),
        kind: kind
            .parse::<Kind>()
            .map_err(|e| DataStoreError::Internal(e.to_string()))?,
        validation_state: decode_state(&state)?,
        owner: row.try_get("owner")?,
        date_of_creation: row.try_get::<DateTime<Utc>, _>("date_of_creation")?,
        last_update: row.try_get::<DateTime<Utc>, _>("last_update")?,
        attachments: Attachments::default(),
    })
}

/// Inserts a species and returns it with its new identifier.
pub async fn create(tx: &mut Transaction<'_, Postgres>, species: &Species) -> SqlResult<Species> {
    let row = sqlx::query(
        r#"
        INSERT INTO species (kind, validation_state, owner, date_of_creation, last_update)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(species.kind.as_str())
    .bind(species.validation_state.as_str())
    .bind(species.owner.as_deref())
    .bind(species.date_of_creation)
    .bind(species.last_update)
    .fetch_one(&mut **tx)
    .await?;
    Ok(Species {
        id: SpeciesId(row.try_get("id")?),
        attachments: Attachments::default(),
        ..species.clone()
    })
}

/// Retrieves a species with its attachments.
pub async fn get(tx: &mut Transaction<'_, Postgres>, id: SpeciesId) -> SqlResult<Option<Species>> {
    let row = sqlx::query(&format!("SELECT {} FROM species s WHERE s.id = $1", COLUMNS))
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut species = decode(&row)?;
    species.attachments = sub_document::attachments(tx, &[species.id])
        .await?
        .remove(&species.id)
        .unwrap_or_default();
    Ok(Some(species))
}

/// Overwrites the stored fields of a species.
///
/// # Returns
/// * `Err(DataStoreError::NotFound)` - No such species
pub async fn update(tx: &mut Transaction<'_, Postgres>, species: &Species) -> SqlResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE species
        SET kind = $2, validation_state = $3, owner = $4, last_update = $5
        WHERE id = $1
        "#,
    )
    .bind(species.id.get())
    .bind(species.kind.as_str())
    .bind(species.validation_state.as_str())
    .bind(species.owner.as_deref())
    .bind(species.last_update)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DataStoreError::NotFound);
    }
    Ok(())
}

/// Deletes a species.  Its sub-documents are left in place.
pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: SpeciesId) -> SqlResult<bool> {
    let result = sqlx::query("DELETE FROM species WHERE id = $1")
        .bind(id.get())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Pushes the `FROM` and `WHERE` clauses shared by the page and count queries.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &SpeciesQuery) {
    builder.push(
        " FROM species s \
         LEFT JOIN sub_documents n ON n.species_id = s.id AND n.doc_type = 'species_naming' \
         LEFT JOIN sub_documents c ON c.species_id = s.id AND c.doc_type = 'common_living_properties' \
         WHERE TRUE",
    );
    if let VisibilityPredicate::AnyOf(clauses) = &query.visibility {
        builder.push(" AND (FALSE");
        for clause in clauses {
            let states: Vec<String> = clause.states.iter().map(|s| s.to_string()).collect();
            builder.push(" OR (s.kind = ");
            builder.push_bind(clause.kind.as_str());
            builder.push(" AND s.validation_state = ANY(");
            builder.push_bind(states);
            builder.push("))");
        }
        builder.push(")");
    }
    if let Some(kind) = query.kind {
        builder.push(" AND s.kind = ");
        builder.push_bind(kind.as_str());
    }
    if let Some(name) = &query.scientific_name {
        builder.push(" AND n.body->>'scientificName' ILIKE ");
        builder.push_bind(escape_like(name));
    }
    if let Some(origin) = &query.origin {
        builder.push(" AND c.body->>'origin' = ");
        builder.push_bind(origin.clone());
    }
    if let Some(difficulty) = &query.difficulty {
        builder.push(" AND c.body->>'difficulty' = ");
        builder.push_bind(difficulty.clone());
    }
}

fn order_clause(order: &[(SortField, SortDirection)]) -> String {
    let mut terms: Vec<String> = order
        .iter()
        .map(|(field, direction)| {
            let column = match field {
                SortField::ScientificName => "n.body->>'scientificName'",
                SortField::DateOfCreation => "s.date_of_creation",
            };
            let direction = match direction {
                SortDirection::Asc => "ASC NULLS LAST",
                SortDirection::Desc => "DESC NULLS FIRST",
            };
            format!("{} {}", column, direction)
        })
        .collect();
    terms.push("s.id ASC".to_string());
    format!(" ORDER BY {}", terms.join(", "))
}

/// `LIMIT` and `OFFSET` of the page, clamped to what Postgres accepts.
fn window(query: &SpeciesQuery) -> (i64, i64) {
    let clamp = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
    (clamp(query.page_size), clamp(query.offset()))
}

/// Runs a collection query.  Visibility and filters apply to both the page and the count.
pub async fn list(
    tx: &mut Transaction<'_, Postgres>,
    query: &SpeciesQuery,
) -> SqlResult<Page<Species>> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) AS total");
    push_filters(&mut count, query);
    let total: i64 = count.build().fetch_one(&mut **tx).await?.try_get("total")?;

    let mut select = QueryBuilder::new(format!("SELECT {}", COLUMNS));
    push_filters(&mut select, query);
    select.push(order_clause(&query.order));
    let (limit, offset) = window(query);
    select.push(" LIMIT ");
    select.push_bind(limit);
    select.push(" OFFSET ");
    select.push_bind(offset);
    let rows = select.build().fetch_all(&mut **tx).await?;

    let mut items = rows.iter().map(decode).collect::<SqlResult<Vec<_>>>()?;
    let ids: Vec<SpeciesId> = items.iter().map(|s| s.id).collect();
    let mut attachments: HashMap<SpeciesId, Attachments> =
        sub_document::attachments(tx, &ids).await?;
    for species in items.iter_mut() {
        species.attachments = attachments.remove(&species.id).unwrap_or_default();
    }
    Ok(Page {
        items,
        total_items: total as usize,
    })
}
