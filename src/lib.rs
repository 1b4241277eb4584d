//! # Aquacatalog: a role-aware catalog of aquarium species
//!
//! Aquacatalog stores species (fish, plants and invertebrates) and the sub-documents that
//! describe them: naming, water constraints, reproduction, behaviour, living properties,
//! kind-specific specs and images.  Contributors post species; editors of a kind review and
//! publish them; anonymous visitors only ever see what has been published.
//!
//! ## Core Concepts
//!
//! ### Kinds
//! Every species has a [`Kind`].  The kind decides which sub-documents are legal, which
//! sub-documents are required before publication, and which editor role grants elevated
//! access.  All of this lives in one [`KindDescriptor`] table.
//!
//! ### Callers and rights
//! A [`Caller`] is an identity plus a set of [`Role`]s, extracted from a bearer token.  It is
//! resolved once per request into [`AccessRights`]: the validation states visible per kind,
//! the kinds the caller edits, and whether the caller is an admin.
//!
//! ### Visibility
//! Collections are filtered inside the query, so page contents and `totalItems` never
//! include a species the caller may not see.  Single reads are voted on instead and answer
//! 401 or 403, never 404, for existing species.
//!
//! ### Serialization groups
//! Each field carries [`Group`] tags.  A field is rendered or accepted only when one of its
//! groups is active for the operation; attributes outside the active groups are rejected.
//!
//! ### Publication
//! Species start `posted`.  Editors of the kind move them to `published`; when completeness
//! is enforced, the species must first hold every required sub-document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HTTP API Layer (Axum routes)            │
//! ├─────────────────────────────────────────┤
//! │ CatalogService (authorize, decode,      │
//! │ validate, stamp, persist, render)       │
//! ├─────────────────────────────────────────┤
//! │ Access core (rights, visibility,        │
//! │ voter, groups, structure, completion)   │
//! ├─────────────────────────────────────────┤
//! │ Data Store (in-memory or PostgreSQL)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Examples
//!
//! ### Resolving rights
//!
//! ```rust
//! use aquacatalog::{AccessRights, Caller, Kind, Role, ValidationState};
//!
//! let editor = Caller::authenticated("42", [Role::User, Role::PlantEditor]);
//! let rights = AccessRights::resolve(&editor);
//! assert!(rights.may_see(Kind::Plant, ValidationState::Posted));
//! assert!(!rights.may_see(Kind::Fish, ValidationState::Posted));
//! assert!(rights.may_see(Kind::Fish, ValidationState::Published));
//! ```
//!
//! ### Running the catalog in memory
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use aquacatalog::{CatalogConfig, CatalogService, Caller, Environment, InMemoryDataStore, Role};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let service = CatalogService::new(
//!     Arc::new(InMemoryDataStore::new()),
//!     CatalogConfig::for_environment(Environment::Development),
//! );
//! let alice = Caller::authenticated("alice", [Role::User]);
//! let created = service.create_species(&alice, json!({"kind": "fish"})).await.unwrap();
//! assert_eq!(created["kind"], "fish");
//!
//! // Posted species are invisible to anonymous callers.
//! let page = service.list_species(&Caller::anonymous(), Default::default()).await.unwrap();
//! assert_eq!(page.total_items, 0);
//! # });
//! ```

#![deny(missing_docs)]

/// HTTP routes and extractors.
pub mod api;
/// Caller identity and role tags.
pub mod caller;
/// Publication readiness.
pub mod completion;
pub mod config;
pub mod data_store;
/// Error taxonomy and HTTP error responses.
pub mod errors;
/// Serialization groups and their selection.
pub mod groups;
pub mod kind;
/// Ownership stamping and update timestamps.
pub mod ownership;
/// Per-caller access rights.
pub mod rights;
pub mod service;
/// Species records.
pub mod species;
pub mod sql;
/// Structural checks against the kind descriptors.
pub mod structure;
/// Sub-document records and their domain validation.
pub mod subdocument;
/// Field exposure and request body decoding.
pub mod view;
/// Query-level visibility.
pub mod visibility;
/// Item access decisions.
pub mod voter;

pub use api::{AppState, JsonBody, ListParams, create_species_router};
pub use caller::{Caller, Role, TokenClaims};
pub use completion::{COMMON_REQUIREMENTS, is_ready_to_publish, missing_for_publication};
pub use config::{CatalogConfig, ConfigError, Environment};
pub use data_store::{
    DataStore, InMemoryDataStore, Page, SortDirection, SortField, SpeciesQuery,
};
pub use errors::{CatalogError, DataStoreError, Violation};
pub use groups::{Direction, Group, GroupSet, Operation, select_groups};
pub use kind::{Kind, KindDescriptor, SubDocumentKind, UnknownKind};
pub use ownership::{Owned, Timestamped, stamp_owner};
pub use rights::AccessRights;
pub use service::{CatalogService, Collection};
pub use species::{Attachments, Species, SpeciesId, ValidationState};
pub use sql::PgDataStore;
pub use structure::{check_attachment, check_kind_exclusivity, parse_validation_state};
pub use subdocument::{SubDocument, SubDocumentBody, SubDocumentId};
pub use visibility::{KindClause, ResourceType, VisibilityPredicate, visibility_filter};
pub use voter::{AccessDenied, authorize_read, vote_on_read};
