//! PostgreSQL storage for the catalog.
//!
//! The table modules expose free functions over a transaction; [`PgDataStore`] wraps each
//! [`DataStore`] call in its own transaction.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::data_store::{DataStore, Page, SpeciesQuery};
use crate::kind::SubDocumentKind;
use crate::species::{Species, SpeciesId};
use crate::subdocument::{SubDocument, SubDocumentId};
use crate::DataStoreError;

/// Species operations.
pub mod species;

/// Sub-document operations.
pub mod sub_document;

/// [`DataStore`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    /// Wraps an already migrated pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, DataStoreError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DataStoreError::Internal(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn create_species(&self, species: Species) -> Result<Species, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let created = species::create(&mut tx, &species).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_species(&self, id: SpeciesId) -> Result<Option<Species>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let found = species::get(&mut tx, id).await?;
        tx.commit().await?;
        Ok(found)
    }

    async fn update_species(&self, record: &Species) -> Result<(), DataStoreError> {
        let mut tx = self.pool.begin().await?;
        species::update(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_species(&self, id: SpeciesId) -> Result<bool, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted = species::delete(&mut tx, id).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn list_species(&self, query: &SpeciesQuery) -> Result<Page<Species>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let page = species::list(&mut tx, query).await?;
        tx.commit().await?;
        Ok(page)
    }

    async fn create_sub_document(
        &self,
        document: SubDocument,
    ) -> Result<SubDocument, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let created = sub_document::create(&mut tx, &document).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<Option<SubDocument>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let found = sub_document::get(&mut tx, kind, id).await?;
        tx.commit().await?;
        Ok(found)
    }

    async fn update_sub_document(&self, document: &SubDocument) -> Result<(), DataStoreError> {
        let mut tx = self.pool.begin().await?;
        sub_document::update(&mut tx, document).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_sub_documents(&self, documents: &[SubDocument]) -> Result<(), DataStoreError> {
        let mut tx = self.pool.begin().await?;
        for document in documents {
            sub_document::update(&mut tx, document).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<bool, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted = sub_document::delete(&mut tx, kind, id).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn list_sub_documents(
        &self,
        species: SpeciesId,
    ) -> Result<Vec<SubDocument>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let documents = sub_document::list_for_species(&mut tx, species).await?;
        tx.commit().await?;
        Ok(documents)
    }
}
