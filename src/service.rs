//! The catalog operations, wiring the access core to storage.
//!
//! Every operation takes the [`Caller`] explicitly, resolves its [`AccessRights`] once, and
//! then runs the same sequence: authorize, decode the body under the operation's groups,
//! check structure, stamp ownership, refresh `lastUpdate`, persist, render.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::caller::Caller;
use crate::completion::missing_for_publication;
use crate::config::CatalogConfig;
use crate::data_store::{DataStore, SpeciesQuery};
use crate::errors::{CatalogError, DataStoreError, Violation};
use crate::groups::{GroupSet, Operation};
use crate::kind::SubDocumentKind;
use crate::ownership::{Timestamped, stamp_owner};
use crate::rights::AccessRights;
use crate::species::{Species, SpeciesId, ValidationState};
use crate::structure::{check_attachment, check_kind_exclusivity};
use crate::subdocument::{SubDocument, SubDocumentBody, SubDocumentId};
use crate::view::{
    parse_species_write, parse_sub_document_write, render_species, render_sub_document,
};
use crate::visibility::{ResourceType, visibility_filter};
use crate::voter::{AccessDenied, authorize_read, vote_on_read};

const NOT_BLANK: &str = "This value should not be blank.";

/// A rendered page of species.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Rendered species.
    pub items: Vec<Value>,
    /// Visible matches across all pages.
    pub total_items: usize,
    /// One-based page number.
    pub page: usize,
}

/// The catalog.
pub struct CatalogService {
    store: Arc<dyn DataStore>,
    config: CatalogConfig,
}

impl CatalogService {
    /// Creates a catalog over `store`.
    pub fn new(store: Arc<dyn DataStore>, config: CatalogConfig) -> Self {
        Self { store, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    ////////////////////////////////////////////// species /////////////////////////////////////////

    /// Lists the species the caller may see.
    ///
    /// The visibility predicate and the configured page size replace whatever `query` carries.
    pub async fn list_species(
        &self,
        caller: &Caller,
        mut query: SpeciesQuery,
    ) -> Result<Collection, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let groups = GroupSet::for_operation(Operation::ListSpecies, &rights);
        query.visibility = visibility_filter(&rights, ResourceType::Species);
        query.page = query.page.max(1);
        query.page_size = self.config.page_size;
        let page = self.store.list_species(&query).await?;
        let mut items = Vec::with_capacity(page.items.len());
        for species in &page.items {
            let documents = self.store.list_sub_documents(species.id).await?;
            items.push(render_species(species, &documents, &groups.normalize));
        }
        debug!(
            identity = caller.identity(),
            total = page.total_items,
            "listed species"
        );
        Ok(Collection {
            items,
            total_items: page.total_items,
            page: query.page,
        })
    }

    /// Reads one species.
    pub async fn get_species(&self, caller: &Caller, id: SpeciesId) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let species = self.load_species(id).await?;
        self.authorize(caller, &rights, &species, Access::Read)?;
        self.render(&species, Operation::GetSpecies, &rights).await
    }

    /// Creates a species.  Anonymous callers may create; the species simply has no owner.
    pub async fn create_species(
        &self,
        caller: &Caller,
        body: Value,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let groups = GroupSet::for_operation(Operation::CreateSpecies, &rights);
        let write = parse_species_write(body, &groups)?;
        let Some(kind) = write.kind else {
            return Err(CatalogError::ConstraintViolation(vec![Violation::new(
                "kind", NOT_BLANK,
            )]));
        };
        let now = Utc::now();
        let mut species = Species::new(kind, now);
        species.owner = write.owner;
        stamp_owner(&mut species, caller);
        if self.config.structural_check_on_create {
            check_kind_exclusivity(&species)?;
        }
        species.touch(now);
        let species = self.store.create_species(species).await?;
        info!(
            species = %species.id,
            kind = %species.kind,
            owner = species.owner.as_deref(),
            "created species"
        );
        self.render(&species, Operation::CreateSpecies, &rights).await
    }

    /// Updates a species and re-points the referenced sub-documents at it.
    ///
    /// `kind` is immutable and silently kept; `owner` is only taken when none is set.
    pub async fn update_species(
        &self,
        caller: &Caller,
        id: SpeciesId,
        body: Value,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let mut species = self.load_species(id).await?;
        self.authorize(caller, &rights, &species, Access::Write)?;
        let groups = GroupSet::for_operation(Operation::UpdateSpecies, &rights);
        let write = parse_species_write(body, &groups)?;

        let mut moves = Vec::with_capacity(write.references.len());
        let mut prospective = species.clone();
        for (kind, document_id) in &write.references {
            let document = self.load_sub_document(*kind, *document_id).await?;
            if document.species != species.id {
                self.authorize_document(caller, &rights, &document, Access::Write).await?;
                let held = species.attachments.get(*kind);
                if held.is_some_and(|held| held != document.id) {
                    warn!(species = %species.id, kind = %kind, "slot already taken");
                    return Err(attach_conflict(
                        DataStoreError::AlreadyExists,
                        species.id,
                        *kind,
                    ));
                }
                moves.push(document);
            }
            prospective.attachments.attach(*kind, *document_id);
        }
        if let Err(err) = check_kind_exclusivity(&prospective) {
            warn!(species = %species.id, error = %err, "rejected species update");
            return Err(err);
        }

        let now = Utc::now();
        for document in moves.iter_mut() {
            document.species = species.id;
            document.touch(now);
        }
        self.store.update_sub_documents(&moves).await?;
        if species.owner.is_none() {
            species.owner = write.owner;
        }
        species.touch(now);
        self.store.update_species(&species).await?;
        let species = self.load_species(id).await?;
        self.render(&species, Operation::UpdateSpecies, &rights).await
    }

    /// Deletes a species.  Its sub-documents stay in place.
    pub async fn delete_species(&self, caller: &Caller, id: SpeciesId) -> Result<(), CatalogError> {
        let rights = AccessRights::resolve(caller);
        let species = self.load_species(id).await?;
        self.authorize(caller, &rights, &species, Access::Write)?;
        if !self.store.delete_species(id).await? {
            return Err(not_found("Species", id));
        }
        info!(species = %id, identity = caller.identity(), "deleted species");
        Ok(())
    }

    /// Sets the validation state of a species.
    ///
    /// Only editors of the species' kind and admins may do this.  Moving from `posted` to
    /// `published` requires a complete species when the configuration enforces it.
    pub async fn validate_species(
        &self,
        caller: &Caller,
        id: SpeciesId,
        body: Value,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let mut species = self.load_species(id).await?;
        if let Err(denied) = vote_on_read(&rights, species.kind) {
            warn!(species = %id, identity = caller.identity(), ?denied, "publication denied");
            return Err(denied.into());
        }
        let groups = GroupSet::for_operation(Operation::ValidateSpecies, &rights);
        let write = parse_species_write(body, &groups)?;
        let Some(state) = write.validation_state else {
            return Err(CatalogError::ConstraintViolation(vec![Violation::new(
                "validationState",
                NOT_BLANK,
            )]));
        };
        check_kind_exclusivity(&species)?;
        let publishing = state == ValidationState::Published && !species.is_published();
        if publishing && self.config.enforces_publication_completeness() {
            let missing = missing_for_publication(&species);
            if !missing.is_empty() {
                warn!(species = %id, ?missing, "species not ready for publication");
                return Err(CatalogError::PublicationNotReady { missing });
            }
        }
        let previous = species.validation_state;
        species.validation_state = state;
        species.touch(Utc::now());
        self.store.update_species(&species).await?;
        info!(
            species = %id,
            from = %previous,
            to = %state,
            identity = caller.identity(),
            "validation state changed"
        );
        self.render(&species, Operation::ValidateSpecies, &rights).await
    }

    //////////////////////////////////////////// sub-documents /////////////////////////////////////

    /// Creates a sub-document pointing at the species named in the body.
    pub async fn create_sub_document(
        &self,
        caller: &Caller,
        kind: SubDocumentKind,
        body: Value,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let groups = GroupSet::for_operation(Operation::WriteSubDocument, &rights);
        let write = parse_sub_document_write(kind, body, &groups)?;
        let Some(species_id) = write.species else {
            return Err(CatalogError::ConstraintViolation(vec![Violation::new(
                "species", NOT_BLANK,
            )]));
        };
        let species = self.load_species(species_id).await?;
        self.authorize(caller, &rights, &species, Access::Write)?;
        if self.config.structural_check_on_create {
            check_attachment(species.kind, kind)?;
        }
        let body = decode_body(kind, Value::Object(write.fields))?;
        body.validate()?;
        let now = Utc::now();
        let mut document = SubDocument::new(species.id, body, now);
        stamp_owner(&mut document, caller);
        document.touch(now);
        let document = self
            .store
            .create_sub_document(document)
            .await
            .map_err(|e| attach_conflict(e, species.id, kind))?;
        info!(
            document = %document.id,
            kind = %kind,
            species = %species.id,
            "created sub-document"
        );
        Ok(self.render_document(&document, &rights))
    }

    /// Reads a sub-document.  Readable whenever its species is.
    pub async fn get_sub_document(
        &self,
        caller: &Caller,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let document = self.load_sub_document(kind, id).await?;
        self.authorize_document(caller, &rights, &document, Access::Read).await?;
        Ok(self.render_document(&document, &rights))
    }

    /// Reads the single-valued sub-document of type `kind` attached to a species.
    ///
    /// Readable whenever the species is; a species without one answers `NotFound`.
    pub async fn get_species_sub_document(
        &self,
        caller: &Caller,
        species_id: SpeciesId,
        kind: SubDocumentKind,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let species = self.load_species(species_id).await?;
        self.authorize(caller, &rights, &species, Access::Read)?;
        let id = species
            .attachments
            .get(kind)
            .ok_or_else(|| not_found(kind.property(), format!("of species {}", species_id)))?;
        let document = self.load_sub_document(kind, id).await?;
        Ok(self.render_document(&document, &rights))
    }

    /// Updates a sub-document, possibly re-pointing it at another species.
    pub async fn update_sub_document(
        &self,
        caller: &Caller,
        kind: SubDocumentKind,
        id: SubDocumentId,
        body: Value,
    ) -> Result<Value, CatalogError> {
        let rights = AccessRights::resolve(caller);
        let mut document = self.load_sub_document(kind, id).await?;
        self.authorize_document(caller, &rights, &document, Access::Write).await?;
        let groups = GroupSet::for_operation(Operation::WriteSubDocument, &rights);
        let write = parse_sub_document_write(kind, body, &groups)?;
        if let Some(target) = write.species.filter(|s| *s != document.species) {
            let species = self.load_species(target).await?;
            self.authorize(caller, &rights, &species, Access::Write)?;
            check_attachment(species.kind, kind)?;
            document.species = target;
        }
        let mut fields = document.body.to_map();
        fields.extend(write.fields);
        let body = decode_body(kind, Value::Object(fields))?;
        body.validate()?;
        document.body = body;
        document.touch(Utc::now());
        self.store
            .update_sub_document(&document)
            .await
            .map_err(|e| attach_conflict(e, document.species, kind))?;
        debug!(document = %id, kind = %kind, "updated sub-document");
        Ok(self.render_document(&document, &rights))
    }

    /// Deletes a sub-document.
    pub async fn delete_sub_document(
        &self,
        caller: &Caller,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<(), CatalogError> {
        let rights = AccessRights::resolve(caller);
        let document = self.load_sub_document(kind, id).await?;
        self.authorize_document(caller, &rights, &document, Access::Write).await?;
        if !self.store.delete_sub_document(kind, id).await? {
            return Err(not_found(kind.property(), id));
        }
        info!(document = %id, kind = %kind, "deleted sub-document");
        Ok(())
    }

    ////////////////////////////////////////////// helpers /////////////////////////////////////////

    async fn load_species(&self, id: SpeciesId) -> Result<Species, CatalogError> {
        self.store
            .get_species(id)
            .await?
            .ok_or_else(|| not_found("Species", id))
    }

    async fn load_sub_document(
        &self,
        kind: SubDocumentKind,
        id: SubDocumentId,
    ) -> Result<SubDocument, CatalogError> {
        self.store
            .get_sub_document(kind, id)
            .await?
            .ok_or_else(|| not_found(kind.property(), id))
    }

    fn authorize(
        &self,
        caller: &Caller,
        rights: &AccessRights,
        species: &Species,
        access: Access,
    ) -> Result<(), CatalogError> {
        if access == Access::Write && is_owner(caller, species.owner.as_deref()) {
            return Ok(());
        }
        authorize_read(rights, species).map_err(|denied| {
            warn!(
                species = %species.id,
                kind = %species.kind,
                identity = caller.identity(),
                ?access,
                ?denied,
                "access denied"
            );
            CatalogError::AccessDenied(denied)
        })
    }

    /// Sub-documents whose species is gone are only reachable by admins.
    async fn authorize_document(
        &self,
        caller: &Caller,
        rights: &AccessRights,
        document: &SubDocument,
        access: Access,
    ) -> Result<(), CatalogError> {
        match self.store.get_species(document.species).await? {
            Some(species) => self.authorize(caller, rights, &species, access),
            None if rights.is_admin() => Ok(()),
            None if rights.is_authenticated() => Err(AccessDenied::Forbidden.into()),
            None => Err(AccessDenied::Unauthorized.into()),
        }
    }

    async fn render(
        &self,
        species: &Species,
        operation: Operation,
        rights: &AccessRights,
    ) -> Result<Value, CatalogError> {
        let groups = GroupSet::for_operation(operation, rights);
        let documents = self.store.list_sub_documents(species.id).await?;
        Ok(render_species(species, &documents, &groups.normalize))
    }

    fn render_document(&self, document: &SubDocument, rights: &AccessRights) -> Value {
        let groups = GroupSet::for_operation(Operation::ReadSubDocument, rights);
        render_sub_document(document, &groups.normalize)
    }
}

/// Reads follow the voter alone; writes also let the species' owner through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

fn is_owner(caller: &Caller, owner: Option<&str>) -> bool {
    matches!((caller.identity(), owner), (Some(identity), Some(owner)) if identity == owner)
}

fn not_found(resource: &'static str, id: impl ToString) -> CatalogError {
    CatalogError::NotFound {
        resource,
        id: id.to_string(),
    }
}

fn decode_body(kind: SubDocumentKind, value: Value) -> Result<SubDocumentBody, CatalogError> {
    SubDocumentBody::from_value(kind, value).map_err(|e| CatalogError::InvalidBody(e.to_string()))
}

fn attach_conflict(err: DataStoreError, species: SpeciesId, kind: SubDocumentKind) -> CatalogError {
    match err {
        DataStoreError::AlreadyExists => CatalogError::AlreadyAttached {
            species: species.get(),
            property: kind.property(),
        },
        other => CatalogError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::caller::Role;
    use crate::config::Environment;
    use crate::data_store::InMemoryDataStore;
    use crate::kind::Kind;

    fn service(environment: Environment) -> CatalogService {
        CatalogService::new(
            Arc::new(InMemoryDataStore::new()),
            CatalogConfig::for_environment(environment),
        )
    }

    fn editor(role: Role) -> Caller {
        Caller::authenticated("editor", [Role::User, role])
    }

    fn publish() -> Value {
        json!({"validationState": "published"})
    }

    fn id_of(value: &Value) -> SpeciesId {
        SpeciesId(value["id"].as_i64().unwrap())
    }

    async fn create(service: &CatalogService, kind: &str) -> SpeciesId {
        let created = service
            .create_species(&Caller::authenticated("alice", [Role::User]), json!({"kind": kind}))
            .await
            .unwrap();
        id_of(&created)
    }

    async fn attach(
        service: &CatalogService,
        species: SpeciesId,
        kind: SubDocumentKind,
        mut body: Value,
    ) -> SubDocumentId {
        body["species"] = json!(species.get());
        let created = service
            .create_sub_document(&Caller::authenticated("alice", [Role::Admin]), kind, body)
            .await
            .unwrap();
        SubDocumentId(created["id"].as_i64().unwrap())
    }

    async fn complete_plant(service: &CatalogService) -> SpeciesId {
        let id = create(service, "plant").await;
        let documents = [
            (
                SubDocumentKind::CommonLivingProperties,
                json!({"origin": "asia", "difficulty": "beginner"}),
            ),
            (
                SubDocumentKind::SpeciesNaming,
                json!({"scientificName": "Cryptocoryne wendtii", "familyName": "Araceae"}),
            ),
            (
                SubDocumentKind::SpeciesReproduction,
                json!({"reproductionMode": "runners"}),
            ),
            (
                SubDocumentKind::WaterConstraints,
                json!({
                    "phMin": 6.0, "phMax": 8.0,
                    "ghMin": 2, "ghMax": 15,
                    "tempMin": 20, "tempMax": 28
                }),
            ),
            (
                SubDocumentKind::Image,
                json!({"filePath": "/media/wendtii.jpg"}),
            ),
            (
                SubDocumentKind::PlantSpecs,
                json!({"zone": "middle", "soilKind": "sand"}),
            ),
        ];
        for (kind, body) in documents {
            attach(service, id, kind, body).await;
        }
        id
    }

    #[tokio::test]
    async fn creation_stamps_owner_and_defaults_to_posted() {
        let service = service(Environment::Test);
        let id = create(&service, "fish").await;
        let view = service
            .get_species(&editor(Role::FishEditor), id)
            .await
            .unwrap();
        assert_eq!(view["owner"], json!("alice"));
        assert_eq!(view["validationState"], json!("posted"));
    }

    #[tokio::test]
    async fn creation_without_a_known_kind_is_rejected() {
        let service = service(Environment::Test);
        let err = service
            .create_species(&Caller::anonymous(), json!({"kind": "reptile"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::ConstraintViolation(vec![Violation::new("kind", NOT_BLANK)])
        );
    }

    #[tokio::test]
    async fn posted_species_reads_are_voted() {
        let service = service(Environment::Test);
        let plant = create(&service, "plant").await;
        assert_eq!(
            service.get_species(&Caller::anonymous(), plant).await,
            Err(CatalogError::AccessDenied(AccessDenied::Unauthorized))
        );
        assert_eq!(
            service.get_species(&editor(Role::FishEditor), plant).await,
            Err(CatalogError::AccessDenied(AccessDenied::Forbidden))
        );
        assert!(service.get_species(&editor(Role::PlantEditor), plant).await.is_ok());
    }

    #[tokio::test]
    async fn incomplete_species_cannot_be_published_in_production() {
        let service = service(Environment::Production);
        let plant = create(&service, "plant").await;
        let err = service
            .validate_species(&editor(Role::PlantEditor), plant, publish())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::PublicationNotReady { .. }));
    }

    #[tokio::test]
    async fn completeness_is_bypassed_outside_production() {
        let service = service(Environment::Development);
        let plant = create(&service, "plant").await;
        let view = service
            .validate_species(&editor(Role::PlantEditor), plant, publish())
            .await
            .unwrap();
        assert_eq!(view["validationState"], json!("published"));
    }

    #[tokio::test]
    async fn complete_plant_is_published_and_public() {
        let service = service(Environment::Production);
        let plant = complete_plant(&service).await;
        service
            .validate_species(&editor(Role::PlantEditor), plant, publish())
            .await
            .unwrap();
        let view = service.get_species(&Caller::anonymous(), plant).await.unwrap();
        assert_eq!(view["speciesNaming"]["scientificName"], json!("Cryptocoryne wendtii"));
        assert!(view.get("validationState").is_none());
    }

    #[tokio::test]
    async fn only_kind_editors_validate() {
        let service = service(Environment::Test);
        let plant = create(&service, "plant").await;
        let err = service
            .validate_species(
                &Caller::authenticated("u", [Role::User]),
                plant,
                json!({"validationState": "published"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::AccessDenied(AccessDenied::Forbidden));
    }

    #[tokio::test]
    async fn illegal_state_is_rejected() {
        let service = service(Environment::Test);
        let fish = create(&service, "fish").await;
        let err = service
            .validate_species(&editor(Role::FishEditor), fish, json!({"validationState": "draft"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::InvalidStateValue {
                value: "draft".to_string()
            }
        );
    }

    #[tokio::test]
    async fn forbidden_attachment_is_rejected() {
        let service = service(Environment::Test);
        let fish = create(&service, "fish").await;
        let err = service
            .create_sub_document(
                &Caller::authenticated("root", [Role::Admin]),
                SubDocumentKind::PlantSpecs,
                json!({"species": fish.get(), "zone": "back", "soilKind": "sand"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "A fish can not have a plantSpecs property");
    }

    #[tokio::test]
    async fn repointing_checks_the_new_species() {
        let service = service(Environment::Test);
        let admin = Caller::authenticated("root", [Role::Admin]);
        let plant = create(&service, "plant").await;
        let fish = create(&service, "fish").await;
        let specs = service
            .create_sub_document(
                &admin,
                SubDocumentKind::PlantSpecs,
                json!({"species": plant.get(), "zone": "back", "soilKind": "sand"}),
            )
            .await
            .unwrap();
        let specs_id = specs["id"].as_i64().unwrap();
        let err = service
            .update_species(&admin, fish, json!({"plantSpecs": specs_id}))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::StructuralViolation { kind: Kind::Fish, .. }));
    }

    #[tokio::test]
    async fn second_single_valued_attachment_conflicts() {
        let service = service(Environment::Test);
        let plant = create(&service, "plant").await;
        let specs = json!({"zone": "back", "soilKind": "sand"});
        attach(&service, plant, SubDocumentKind::PlantSpecs, specs).await;
        let err = service
            .create_sub_document(
                &Caller::authenticated("root", [Role::Admin]),
                SubDocumentKind::PlantSpecs,
                json!({"species": plant.get(), "zone": "front", "soilKind": "sand"}),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::AlreadyAttached {
                species: plant.get(),
                property: "plantSpecs"
            }
        );
    }

    #[tokio::test]
    async fn update_keeps_kind_and_first_owner() {
        let service = service(Environment::Test);
        let admin = Caller::authenticated("root", [Role::Admin]);
        let fish = create(&service, "fish").await;
        let view = service
            .update_species(&admin, fish, json!({"kind": "plant", "owner": "mallory"}))
            .await
            .unwrap();
        assert_eq!(view["kind"], json!("fish"));
        assert_eq!(view["owner"], json!("alice"));
    }

    #[tokio::test]
    async fn sub_document_updates_merge_and_validate() {
        let service = service(Environment::Test);
        let admin = Caller::authenticated("root", [Role::Admin]);
        let plant = create(&service, "plant").await;
        let specs = service
            .create_sub_document(
                &admin,
                SubDocumentKind::PlantSpecs,
                json!({"species": plant.get(), "zone": "back", "soilKind": "sand"}),
            )
            .await
            .unwrap();
        let id = SubDocumentId(specs["id"].as_i64().unwrap());
        let updated = service
            .update_sub_document(&admin, SubDocumentKind::PlantSpecs, id, json!({"size": 25}))
            .await
            .unwrap();
        assert_eq!(updated["zone"], json!("back"));
        assert_eq!(updated["size"], json!(25));
        let err = service
            .update_sub_document(&admin, SubDocumentKind::PlantSpecs, id, json!({"zone": "roof"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn sub_documents_inherit_species_visibility() {
        let service = service(Environment::Test);
        let plant = create(&service, "plant").await;
        let specs = service
            .create_sub_document(
                &Caller::authenticated("root", [Role::Admin]),
                SubDocumentKind::PlantSpecs,
                json!({"species": plant.get(), "zone": "back", "soilKind": "sand"}),
            )
            .await
            .unwrap();
        let id = SubDocumentId(specs["id"].as_i64().unwrap());
        assert_eq!(
            service
                .get_sub_document(&Caller::anonymous(), SubDocumentKind::PlantSpecs, id)
                .await,
            Err(CatalogError::AccessDenied(AccessDenied::Unauthorized))
        );
        assert!(
            service
                .get_sub_document(&editor(Role::PlantEditor), SubDocumentKind::PlantSpecs, id)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn owners_write_but_do_not_read_their_posted_species() {
        let service = service(Environment::Test);
        let plant = create(&service, "plant").await;
        let alice = Caller::authenticated("alice", [Role::User]);
        let bob = Caller::authenticated("bob", [Role::User]);
        let body = json!({"species": plant.get(), "zone": "back", "soilKind": "sand"});
        service
            .create_sub_document(&alice, SubDocumentKind::PlantSpecs, body.clone())
            .await
            .unwrap();
        assert_eq!(
            service
                .create_sub_document(&bob, SubDocumentKind::PlantSpecs, body)
                .await,
            Err(CatalogError::AccessDenied(AccessDenied::Forbidden))
        );
        assert_eq!(
            service.get_species(&alice, plant).await,
            Err(CatalogError::AccessDenied(AccessDenied::Forbidden))
        );
    }

    #[tokio::test]
    async fn listing_hides_posted_species() {
        let service = service(Environment::Test);
        create(&service, "fish").await;
        create(&service, "plant").await;
        let anonymous = service
            .list_species(&Caller::anonymous(), SpeciesQuery::default())
            .await
            .unwrap();
        assert_eq!(anonymous.total_items, 0);
        let fish_editor = service
            .list_species(&editor(Role::FishEditor), SpeciesQuery::default())
            .await
            .unwrap();
        assert_eq!(fish_editor.total_items, 1);
        assert_eq!(fish_editor.items[0]["kind"], json!("fish"));
    }

    #[tokio::test]
    async fn update_cannot_take_documents_of_unreadable_species() {
        let service = service(Environment::Test);
        let hidden = create(&service, "fish").await;
        let naming = attach(
            &service,
            hidden,
            SubDocumentKind::SpeciesNaming,
            json!({"scientificName": "Betta splendens", "familyName": "Osphronemidae"}),
        )
        .await;
        let mallory = Caller::authenticated("mallory", [Role::User]);
        let mine = service
            .create_species(&mallory, json!({"kind": "fish"}))
            .await
            .unwrap();
        assert_eq!(
            service
                .update_species(&mallory, id_of(&mine), json!({"speciesNaming": naming.get()}))
                .await,
            Err(CatalogError::AccessDenied(AccessDenied::Forbidden))
        );
        let hidden = service
            .get_species(&editor(Role::FishEditor), hidden)
            .await
            .unwrap();
        assert_eq!(hidden["speciesNaming"]["id"], json!(naming.get()));
    }

    #[tokio::test]
    async fn conflicting_reference_moves_nothing() {
        let service = service(Environment::Test);
        let admin = Caller::authenticated("root", [Role::Admin]);
        let specs = json!({"maleSize": 4, "femaleSize": 5, "aquariumKind": "communal"});
        let donor = create(&service, "fish").await;
        let naming = attach(
            &service,
            donor,
            SubDocumentKind::SpeciesNaming,
            json!({"scientificName": "Danio rerio", "familyName": "Cyprinidae"}),
        )
        .await;
        let other = create(&service, "fish").await;
        let other_specs =
            attach(&service, other, SubDocumentKind::AnimalSpecs, specs.clone()).await;
        let target = create(&service, "fish").await;
        attach(&service, target, SubDocumentKind::AnimalSpecs, specs).await;

        let body = json!({"speciesNaming": naming.get(), "animalSpecs": other_specs.get()});
        assert_eq!(
            service.update_species(&admin, target, body).await,
            Err(CatalogError::AlreadyAttached {
                species: target.get(),
                property: "animalSpecs",
            })
        );
        let donor = service.get_species(&admin, donor).await.unwrap();
        assert_eq!(donor["speciesNaming"]["id"], json!(naming.get()));
        let target = service.get_species(&admin, target).await.unwrap();
        assert_eq!(target["speciesNaming"], Value::Null);
    }

    #[tokio::test]
    async fn structural_check_can_wait_for_the_next_update() {
        let service = CatalogService::new(
            Arc::new(InMemoryDataStore::new()),
            CatalogConfig {
                structural_check_on_create: false,
                ..CatalogConfig::for_environment(Environment::Test)
            },
        );
        let fish = create(&service, "fish").await;
        attach(
            &service,
            fish,
            SubDocumentKind::PlantSpecs,
            json!({"zone": "back", "soilKind": "sand"}),
        )
        .await;
        let admin = Caller::authenticated("root", [Role::Admin]);
        assert_eq!(
            service.update_species(&admin, fish, json!({})).await,
            Err(CatalogError::StructuralViolation {
                kind: Kind::Fish,
                property: "plantSpecs",
            })
        );
    }

    #[tokio::test]
    async fn attached_document_is_read_through_its_species() {
        let service = service(Environment::Test);
        let plant = create(&service, "plant").await;
        attach(
            &service,
            plant,
            SubDocumentKind::PlantSpecs,
            json!({"zone": "back", "soilKind": "sand"}),
        )
        .await;
        assert_eq!(
            service
                .get_species_sub_document(&Caller::anonymous(), plant, SubDocumentKind::PlantSpecs)
                .await,
            Err(CatalogError::AccessDenied(AccessDenied::Unauthorized))
        );
        let plant_editor = editor(Role::PlantEditor);
        let specs = service
            .get_species_sub_document(&plant_editor, plant, SubDocumentKind::PlantSpecs)
            .await
            .unwrap();
        assert_eq!(specs["zone"], json!("back"));
        assert!(matches!(
            service
                .get_species_sub_document(&plant_editor, plant, SubDocumentKind::SpeciesNaming)
                .await,
            Err(CatalogError::NotFound { .. })
        ));
    }
}
