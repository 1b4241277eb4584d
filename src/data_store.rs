//! # Data Storage Abstraction
//!
//! The [`DataStore`] trait is the catalog's only view of persistence.  Two backends ship with
//! the crate:
//!
//! - **InMemoryDataStore**: thread-safe in-memory storage using `Mutex<HashMap>`
//! - **PgDataStore** (in [`crate::sql`]): PostgreSQL through sqlx
//!
//! ## Storage Model
//!
//! ```text
//! Species (id, kind, validationState, owner, timestamps)
//!    ^
//!    └── SubDocument (id, type, species, owner, timestamps, body)
//! ```
//!
//! Sub-documents point at their species.  A species' attachments are derived from those
//! back-references whenever the species is read, so re-pointing a sub-document is a single
//! write.  A species holds at most one sub-document of each single-valued type.
//!
//! ## Visibility
//!
//! [`SpeciesQuery::visibility`] must be applied inside query execution, before counting and
//! paging, so that neither the page nor `total_items` ever includes a species the caller may
//! not see.
//!
//! ## Usage
//!
//! ```rust
//! use aquacatalog::{DataStore, InMemoryDataStore, Kind, Species, SpeciesQuery};
//! use chrono::Utc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = InMemoryDataStore::new();
//! let species = store.create_species(Species::new(Kind::Fish, Utc::now())).await.unwrap();
//! let found = store.get_species(species.id).await.unwrap();
//! assert_eq!(found.map(|s| s.kind), Some(Kind::Fish));
//!
//! let page = store.list_species(&SpeciesQuery::default()).await.unwrap();
//! assert_eq!(page.total_items, 1);
//! # });
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DataStoreError;
use crate::kind::{Kind, SubDocumentKind};
use crate::species::{Attachments, Species, SpeciesId};
use crate::subdocument::{SubDocument, SubDocumentBody, SubDocumentId};
use crate::visibility::VisibilityPredicate;

/////////////////////////////////////////////// Queries ////////////////////////////////////////////

/// Sortable species fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// `speciesNaming.scientificName`
    ScientificName,
    /// `dateOfCreation`
    DateOfCreation,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending; missing values last.
    #[default]
    Asc,
    /// Descending; missing values first.
    Desc,
}

/// A species collection query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesQuery {
    /// Caller visibility, applied before filters, counting and paging.
    pub visibility: VisibilityPredicate,
    /// Exact kind.
    pub kind: Option<Kind>,
    /// Case-insensitive substring of `speciesNaming.scientificName`.
    pub scientific_name: Option<String>,
    /// Exact `commonLivingProperties.origin`.
    pub origin: Option<String>,
    /// Exact `commonLivingProperties.difficulty`.
    pub difficulty: Option<String>,
    /// Sort keys, most significant first.  Ties fall back to the identifier.
    pub order: Vec<(SortField, SortDirection)>,
    /// One-based page number.
    pub page: usize,
    /// Items per page.
    pub page_size: usize,
}

impl Default for SpeciesQuery {
    fn default() -> Self {
        Self {
            visibility: VisibilityPredicate::Unrestricted,
            kind: None,
            scientific_name: None,
            origin: None,
            difficulty: None,
            order: vec![],
            page: 1,
            page_size: 30,
        }
    }
}

impl SpeciesQuery {
    /// Number of rows to skip.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// One page of results and the number of matches across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total_items: usize,
}

////////////////////////////////////////////// DataStore ///////////////////////////////////////////

/// Trait defining the storage interface for the catalog.
///
/// Implementors must be thread-safe; the service shares one store across all requests as
/// `Arc<dyn DataStore>`.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Persists a new species and returns it with its assigned identifier.
    async fn create_species(&self, species: Species) -> Result<Species, DataStoreError>;

    /// Fetches a species with its attachments.
    async fn get_species(&self, id: SpeciesId) -> Result<Option<Species>, DataStoreError>;

    /// Overwrites the stored fields of an existing species.  Attachments are not stored on
    /// the species and are ignored.
    ///
    /// # Returns
    /// * `Err(DataStoreError::NotFound)` - No such species
    async fn update_species(&self, species: &Species) -> Result<(), DataStoreError>;

    /// Deletes a species.  Sub-documents pointing at it are left in place.
    async fn delete_species(&self, id: SpeciesId) -> Result<bool, DataStoreError>;

    /// Runs a collection query.
    async fn list_species(&self, query: &SpeciesQuery) -> Result<Page<Species>, DataStoreError>;

    /// Persists a new sub-document and returns it with its assigned identifier.
    ///
    /// # Returns
    /// * `Err(DataStoreError::AlreadyExists)` - The species already holds a sub-document of
    ///   this single-valued type
    async fn create_sub_document(
        &self,
        document: SubDocument,
    ) -> Result<SubDocument, DataStoreError>;

    /// Fetches a sub-document of type `kind`.
    async fn get_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<Option<SubDocument>, DataStoreError>;

    /// Overwrites an existing sub-document, possibly re-pointing it.
    ///
    /// # Returns
    /// * `Err(DataStoreError::NotFound)` - No such sub-document
    /// * `Err(DataStoreError::AlreadyExists)` - The new species already holds one of this type
    async fn update_sub_document(&self, document: &SubDocument) -> Result<(), DataStoreError>;

    /// Overwrites several sub-documents at once.  Either every write lands or none does.
    ///
    /// # Returns
    /// * `Err(DataStoreError::NotFound)` - One of the sub-documents does not exist
    /// * `Err(DataStoreError::AlreadyExists)` - A target species already holds one of a type
    async fn update_sub_documents(&self, documents: &[SubDocument]) -> Result<(), DataStoreError>;

    /// Deletes a sub-document of type `kind`.
    async fn delete_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<bool, DataStoreError>;

    /// Every sub-document pointing at `species`, oldest first.
    async fn list_sub_documents(
        &self,
        species: SpeciesId,
    ) -> Result<Vec<SubDocument>, DataStoreError>;
}

////////////////////////////////////////// InMemoryDataStore ///////////////////////////////////////

#[derive(Default)]
struct Tables {
    species: HashMap<SpeciesId, Species>,
    documents: HashMap<SubDocumentId, SubDocument>,
    next_species: i64,
    next_document: i64,
}

impl Tables {
    fn documents_of(&self, species: SpeciesId) -> Vec<&SubDocument> {
        let mut documents: Vec<_> = self
            .documents
            .values()
            .filter(|d| d.species == species)
            .collect();
        documents.sort_by_key(|d| d.id);
        documents
    }

    fn with_attachments(&self, species: &Species) -> Species {
        let mut species = species.clone();
        let mut attachments = Attachments::default();
        for document in self.documents_of(species.id) {
            attachments.attach(document.kind(), document.id);
        }
        species.attachments = attachments;
        species
    }

    fn slot_taken(&self, document: &SubDocument) -> bool {
        let kind = document.kind();
        !kind.is_multi()
            && self.documents.values().any(|d| {
                d.id != document.id && d.species == document.species && d.kind() == kind
            })
    }

    fn put_document(&mut self, document: &SubDocument) -> Result<(), DataStoreError> {
        if !self
            .documents
            .get(&document.id)
            .is_some_and(|d| d.kind() == document.kind())
        {
            return Err(DataStoreError::NotFound);
        }
        if self.slot_taken(document) {
            return Err(DataStoreError::AlreadyExists);
        }
        self.documents.insert(document.id, document.clone());
        Ok(())
    }

    fn body_of(&self, species: SpeciesId, kind: SubDocumentKind) -> Option<&SubDocumentBody> {
        self.documents
            .values()
            .find(|d| d.species == species && d.kind() == kind)
            .map(|d| &d.body)
    }

    fn scientific_name(&self, species: SpeciesId) -> Option<&str> {
        match self.body_of(species, SubDocumentKind::SpeciesNaming) {
            Some(SubDocumentBody::SpeciesNaming(naming)) => naming.scientific_name.as_deref(),
            _ => None,
        }
    }

    fn living_property(&self, species: SpeciesId, origin: bool) -> Option<&str> {
        match self.body_of(species, SubDocumentKind::CommonLivingProperties) {
            Some(SubDocumentBody::CommonLivingProperties(props)) if origin => {
                props.origin.as_deref()
            }
            Some(SubDocumentBody::CommonLivingProperties(props)) => props.difficulty.as_deref(),
            _ => None,
        }
    }

    fn matches(&self, species: &Species, query: &SpeciesQuery) -> bool {
        if !query
            .visibility
            .admits(species.kind, species.validation_state)
        {
            return false;
        }
        if query.kind.is_some_and(|k| k != species.kind) {
            return false;
        }
        if let Some(needle) = &query.scientific_name {
            let needle = needle.to_lowercase();
            if !self
                .scientific_name(species.id)
                .is_some_and(|name| name.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if let Some(origin) = &query.origin {
            if self.living_property(species.id, true) != Some(origin.as_str()) {
                return false;
            }
        }
        if let Some(difficulty) = &query.difficulty {
            if self.living_property(species.id, false) != Some(difficulty.as_str()) {
                return false;
            }
        }
        true
    }

    fn compare(&self, a: &Species, b: &Species, order: &[(SortField, SortDirection)]) -> Ordering {
        for (field, direction) in order {
            let ordering = match field {
                SortField::ScientificName => nulls_last(
                    self.scientific_name(a.id),
                    self.scientific_name(b.id),
                ),
                SortField::DateOfCreation => a.date_of_creation.cmp(&b.date_of_creation),
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    }
}

fn nulls_last(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Thread-safe in-memory implementation of [`DataStore`].
///
/// Identifiers start at 1 and are never reused.
#[derive(Default)]
pub struct InMemoryDataStore {
    tables: Mutex<Tables>,
}

impl InMemoryDataStore {
    /// Creates a new empty in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, DataStoreError> {
        self.tables
            .lock()
            .map_err(|_| DataStoreError::Internal("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn create_species(&self, mut species: Species) -> Result<Species, DataStoreError> {
        let mut tables = self.tables()?;
        tables.next_species += 1;
        species.id = SpeciesId(tables.next_species);
        species.attachments = Attachments::default();
        tables.species.insert(species.id, species.clone());
        Ok(species)
    }

    async fn get_species(&self, id: SpeciesId) -> Result<Option<Species>, DataStoreError> {
        let tables = self.tables()?;
        Ok(tables.species.get(&id).map(|s| tables.with_attachments(s)))
    }

    async fn update_species(&self, species: &Species) -> Result<(), DataStoreError> {
        let mut tables = self.tables()?;
        match tables.species.get_mut(&species.id) {
            Some(stored) => {
                *stored = Species {
                    attachments: Attachments::default(),
                    ..species.clone()
                };
                Ok(())
            }
            None => Err(DataStoreError::NotFound),
        }
    }

    async fn delete_species(&self, id: SpeciesId) -> Result<bool, DataStoreError> {
        let mut tables = self.tables()?;
        Ok(tables.species.remove(&id).is_some())
    }

    async fn list_species(&self, query: &SpeciesQuery) -> Result<Page<Species>, DataStoreError> {
        let tables = self.tables()?;
        let mut matching: Vec<&Species> = tables
            .species
            .values()
            .filter(|s| tables.matches(s, query))
            .collect();
        matching.sort_by(|a, b| tables.compare(a, b, &query.order));
        let total_items = matching.len();
        let items = matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size)
            .map(|s| tables.with_attachments(s))
            .collect();
        Ok(Page { items, total_items })
    }

    async fn create_sub_document(
        &self,
        mut document: SubDocument,
    ) -> Result<SubDocument, DataStoreError> {
        let mut tables = self.tables()?;
        document.id = SubDocumentId(0);
        if tables.slot_taken(&document) {
            return Err(DataStoreError::AlreadyExists);
        }
        tables.next_document += 1;
        document.id = SubDocumentId(tables.next_document);
        tables.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<Option<SubDocument>, DataStoreError> {
        let tables = self.tables()?;
        Ok(tables.documents.get(&id).filter(|d| d.kind() == kind).cloned())
    }

    async fn update_sub_document(&self, document: &SubDocument) -> Result<(), DataStoreError> {
        self.tables()?.put_document(document)
    }

    async fn update_sub_documents(&self, documents: &[SubDocument]) -> Result<(), DataStoreError> {
        let mut tables = self.tables()?;
        let before = tables.documents.clone();
        for document in documents {
            if let Err(e) = tables.put_document(document) {
                tables.documents = before;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn delete_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<bool, DataStoreError> {
        let mut tables = self.tables()?;
        if !tables.documents.get(&id).is_some_and(|d| d.kind() == kind) {
            return Ok(false);
        }
        Ok(tables.documents.remove(&id).is_some())
    }

    async fn list_sub_documents(
        &self,
        species: SpeciesId,
    ) -> Result<Vec<SubDocument>, DataStoreError> {
        let tables = self.tables()?;
        Ok(tables.documents_of(species).into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::caller::{Caller, Role};
    use crate::rights::AccessRights;
    use crate::species::ValidationState;
    use crate::visibility::{ResourceType, visibility_filter};

    async fn species(store: &InMemoryDataStore, kind: Kind, state: ValidationState) -> Species {
        let mut species = Species::new(kind, Utc::now());
        species.validation_state = state;
        store.create_species(species).await.unwrap()
    }

    async fn attach(
        store: &InMemoryDataStore,
        species: SpeciesId,
        kind: SubDocumentKind,
        body: serde_json::Value,
    ) -> Result<SubDocument, DataStoreError> {
        let body = SubDocumentBody::from_value(kind, body).unwrap();
        store
            .create_sub_document(SubDocument::new(species, body, Utc::now()))
            .await
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let store = InMemoryDataStore::new();
        let a = species(&store, Kind::Fish, ValidationState::Posted).await;
        let b = species(&store, Kind::Plant, ValidationState::Posted).await;
        assert_eq!(a.id, SpeciesId(1));
        assert_eq!(b.id, SpeciesId(2));
    }

    #[tokio::test]
    async fn attachments_follow_back_references() {
        let store = InMemoryDataStore::new();
        let fish = species(&store, Kind::Fish, ValidationState::Posted).await;
        let specs = attach(&store, fish.id, SubDocumentKind::AnimalSpecs, json!({}))
            .await
            .unwrap();
        attach(&store, fish.id, SubDocumentKind::Image, json!({"filePath": "a"}))
            .await
            .unwrap();
        attach(&store, fish.id, SubDocumentKind::Image, json!({"filePath": "b"}))
            .await
            .unwrap();
        let fetched = store.get_species(fish.id).await.unwrap().unwrap();
        assert_eq!(fetched.attachments.get(SubDocumentKind::AnimalSpecs), Some(specs.id));
        assert_eq!(fetched.attachments.images().len(), 2);

        let other = species(&store, Kind::Fish, ValidationState::Posted).await;
        let mut moved = specs.clone();
        moved.species = other.id;
        store.update_sub_document(&moved).await.unwrap();
        let fetched = store.get_species(fish.id).await.unwrap().unwrap();
        assert!(!fetched.attachments.has(SubDocumentKind::AnimalSpecs));
        let fetched = store.get_species(other.id).await.unwrap().unwrap();
        assert!(fetched.attachments.has(SubDocumentKind::AnimalSpecs));
    }

    #[tokio::test]
    async fn single_valued_slot_is_unique() {
        let store = InMemoryDataStore::new();
        let fish = species(&store, Kind::Fish, ValidationState::Posted).await;
        attach(&store, fish.id, SubDocumentKind::AnimalSpecs, json!({}))
            .await
            .unwrap();
        assert_eq!(
            attach(&store, fish.id, SubDocumentKind::AnimalSpecs, json!({})).await,
            Err(DataStoreError::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn sub_documents_are_typed() {
        let store = InMemoryDataStore::new();
        let fish = species(&store, Kind::Fish, ValidationState::Posted).await;
        let specs = attach(&store, fish.id, SubDocumentKind::AnimalSpecs, json!({}))
            .await
            .unwrap();
        assert!(
            store
                .get_sub_document(SubDocumentKind::PlantSpecs, specs.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            !store
                .delete_sub_document(SubDocumentKind::PlantSpecs, specs.id)
                .await
                .unwrap()
        );
        assert!(
            store
                .delete_sub_document(SubDocumentKind::AnimalSpecs, specs.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn visibility_applies_before_counting() {
        let store = InMemoryDataStore::new();
        species(&store, Kind::Fish, ValidationState::Published).await;
        species(&store, Kind::Fish, ValidationState::Posted).await;
        species(&store, Kind::Plant, ValidationState::Posted).await;
        species(&store, Kind::Plant, ValidationState::Published).await;

        let editor = AccessRights::resolve(&Caller::authenticated("e", [Role::FishEditor]));
        let query = SpeciesQuery {
            visibility: visibility_filter(&editor, ResourceType::Species),
            page_size: 1,
            ..SpeciesQuery::default()
        };
        let page = store.list_species(&query).await.unwrap();
        assert_eq!(page.total_items, 3);
        assert_eq!(page.items.len(), 1);

        let anonymous = AccessRights::resolve(&Caller::anonymous());
        let query = SpeciesQuery {
            visibility: visibility_filter(&anonymous, ResourceType::Species),
            ..SpeciesQuery::default()
        };
        let page = store.list_species(&query).await.unwrap();
        assert_eq!(page.total_items, 2);
        assert!(page.items.iter().all(|s| s.is_published()));
    }

    #[tokio::test]
    async fn filters_and_order() {
        let store = InMemoryDataStore::new();
        let names = ["Pterophyllum scalare", "Paracheirodon innesi", "Corydoras paleatus"];
        for (i, name) in names.iter().enumerate() {
            let mut s = Species::new(Kind::Fish, Utc::now() + Duration::seconds(i as i64));
            s.validation_state = ValidationState::Published;
            let s = store.create_species(s).await.unwrap();
            attach(
                &store,
                s.id,
                SubDocumentKind::SpeciesNaming,
                json!({"scientificName": name}),
            )
            .await
            .unwrap();
            let origin = if i == 2 { "amazonia" } else { "asia" };
            attach(
                &store,
                s.id,
                SubDocumentKind::CommonLivingProperties,
                json!({"origin": origin, "difficulty": "beginner"}),
            )
            .await
            .unwrap();
        }
        species(&store, Kind::Fish, ValidationState::Published).await;

        let query = SpeciesQuery {
            scientific_name: Some("PARA".to_string()),
            ..SpeciesQuery::default()
        };
        let page = store.list_species(&query).await.unwrap();
        assert_eq!(page.total_items, 1);

        let query = SpeciesQuery {
            origin: Some("asia".to_string()),
            ..SpeciesQuery::default()
        };
        assert_eq!(store.list_species(&query).await.unwrap().total_items, 2);

        let query = SpeciesQuery {
            order: vec![(SortField::ScientificName, SortDirection::Asc)],
            ..SpeciesQuery::default()
        };
        let ids: Vec<i64> = store
            .list_species(&query)
            .await
            .unwrap()
            .items
            .iter()
            .map(|s| s.id.get())
            .collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);

        let query = SpeciesQuery {
            order: vec![(SortField::DateOfCreation, SortDirection::Desc)],
            page: 2,
            page_size: 2,
            ..SpeciesQuery::default()
        };
        let page = store.list_species(&query).await.unwrap();
        assert_eq!(page.total_items, 4);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn batch_update_is_all_or_nothing() {
        let store = InMemoryDataStore::new();
        let donor = species(&store, Kind::Fish, ValidationState::Posted).await;
        let target = species(&store, Kind::Fish, ValidationState::Posted).await;
        let naming = attach(&store, donor.id, SubDocumentKind::SpeciesNaming, json!({}))
            .await
            .unwrap();
        let specs = attach(&store, donor.id, SubDocumentKind::AnimalSpecs, json!({}))
            .await
            .unwrap();
        attach(&store, target.id, SubDocumentKind::AnimalSpecs, json!({}))
            .await
            .unwrap();

        let moved: Vec<SubDocument> = [naming, specs]
            .into_iter()
            .map(|mut d| {
                d.species = target.id;
                d
            })
            .collect();
        assert_eq!(
            store.update_sub_documents(&moved).await,
            Err(DataStoreError::AlreadyExists)
        );
        let donor = store.get_species(donor.id).await.unwrap().unwrap();
        assert!(donor.attachments.has(SubDocumentKind::SpeciesNaming));
        assert!(donor.attachments.has(SubDocumentKind::AnimalSpecs));

        store.update_sub_documents(&moved[..1]).await.unwrap();
        let target = store.get_species(target.id).await.unwrap().unwrap();
        assert!(target.attachments.has(SubDocumentKind::SpeciesNaming));
    }

    #[tokio::test]
    async fn update_requires_existing_species() {
        let store = InMemoryDataStore::new();
        let ghost = Species::new(Kind::Plant, Utc::now());
        assert_eq!(
            store.update_species(&ghost).await,
            Err(DataStoreError::NotFound)
        );
    }
}
