//! HTTP surface of the catalog.
//!
//! Every handler extracts the [`Caller`] from the request and hands it to the
//! [`CatalogService`]; all failures come back as [`CatalogError`] responses.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::Json;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde_json::Value;

use crate::caller::Caller;
use crate::data_store::{SortDirection, SortField, SpeciesQuery};
use crate::errors::CatalogError;
use crate::kind::{Kind, SubDocumentKind};
use crate::service::{CatalogService, Collection};
use crate::species::SpeciesId;
use crate::subdocument::SubDocumentId;

/// Shared state of the catalog routes.
#[derive(Clone)]
pub struct AppState {
    /// The catalog every handler delegates to.
    pub service: Arc<CatalogService>,
}

impl AppState {
    /// Wraps `service`.
    pub fn new(service: CatalogService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

//////////////////////////////////////////////// Bodies ////////////////////////////////////////////

/// A request body decoded to a JSON value.
///
/// YAML is accepted when the content type says so; anything else is read as JSON.
pub struct JsonBody(pub Value);

#[axum::async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = CatalogError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let yaml = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("yaml") || ct.contains("yml"));
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| CatalogError::InvalidBody(e.body_text()))?;
        let value = if yaml {
            serde_yml::from_slice(&bytes).map_err(|e| CatalogError::InvalidBody(e.to_string()))?
        } else {
            serde_json::from_slice(&bytes).map_err(|e| CatalogError::InvalidBody(e.to_string()))?
        };
        Ok(JsonBody(value))
    }
}

/////////////////////////////////////////////// Queries ////////////////////////////////////////////

/// Query string of `GET /species`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Exact kind.
    pub kind: Option<String>,
    /// Case-insensitive part of the scientific name.
    #[serde(rename = "speciesNaming.scientificName")]
    pub scientific_name: Option<String>,
    /// Exact origin.
    #[serde(rename = "commonLivingProperties.origin")]
    pub origin: Option<String>,
    /// Exact difficulty.
    #[serde(rename = "commonLivingProperties.difficulty")]
    pub difficulty: Option<String>,
    /// Sort on the scientific name.
    #[serde(rename = "order[speciesNaming.scientificName]")]
    pub order_scientific_name: Option<SortDirection>,
    /// Sort on the creation date.
    #[serde(rename = "order[dateOfCreation]")]
    pub order_date_of_creation: Option<SortDirection>,
    /// One-based page.
    pub page: Option<usize>,
}

impl ListParams {
    /// Converts the parameters into a store query.  Visibility is left for the service.
    pub fn into_query(self) -> Result<SpeciesQuery, CatalogError> {
        let kind = match self.kind.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Kind>()
                    .map_err(|e| CatalogError::InvalidBody(format!("kind: {}", e)))?,
            ),
        };
        let mut order = vec![];
        if let Some(direction) = self.order_scientific_name {
            order.push((SortField::ScientificName, direction));
        }
        if let Some(direction) = self.order_date_of_creation {
            order.push((SortField::DateOfCreation, direction));
        }
        Ok(SpeciesQuery {
            kind,
            scientific_name: self.scientific_name.filter(|s| !s.is_empty()),
            origin: self.origin.filter(|s| !s.is_empty()),
            difficulty: self.difficulty.filter(|s| !s.is_empty()),
            order,
            page: self.page.unwrap_or(1),
            ..SpeciesQuery::default()
        })
    }
}

fn species_id(raw: &str) -> Result<SpeciesId, CatalogError> {
    raw.parse().map_err(|_| CatalogError::NotFound {
        resource: "Species",
        id: raw.to_string(),
    })
}

fn sub_document_id(kind: SubDocumentKind, raw: &str) -> Result<SubDocumentId, CatalogError> {
    raw.parse().map_err(|_| CatalogError::NotFound {
        resource: kind.property(),
        id: raw.to_string(),
    })
}

/////////////////////////////////////////////// Species ////////////////////////////////////////////

async fn list_species(
    State(state): State<AppState>,
    caller: Caller,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Collection>, CatalogError> {
    let Query(params) = params.map_err(|e| CatalogError::InvalidBody(e.body_text()))?;
    let query = params.into_query()?;
    Ok(Json(state.service.list_species(&caller, query).await?))
}

async fn create_species(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Value>), CatalogError> {
    let created = state.service.create_species(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_species(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, CatalogError> {
    let id = species_id(&id)?;
    Ok(Json(state.service.get_species(&caller, id).await?))
}

async fn update_species(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<Value>, CatalogError> {
    let id = species_id(&id)?;
    Ok(Json(state.service.update_species(&caller, id, body).await?))
}

async fn delete_species(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, CatalogError> {
    let id = species_id(&id)?;
    state.service.delete_species(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_species(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<Value>, CatalogError> {
    let id = species_id(&id)?;
    Ok(Json(state.service.validate_species(&caller, id, body).await?))
}

//////////////////////////////////////////// Sub-documents /////////////////////////////////////////

async fn get_species_sub_document(
    state: AppState,
    caller: Caller,
    kind: SubDocumentKind,
    species: String,
) -> Result<Json<Value>, CatalogError> {
    let species = species_id(&species)?;
    Ok(Json(
        state
            .service
            .get_species_sub_document(&caller, species, kind)
            .await?,
    ))
}

async fn create_sub_document(
    state: AppState,
    caller: Caller,
    kind: SubDocumentKind,
    body: Value,
) -> Result<(StatusCode, Json<Value>), CatalogError> {
    let created = state.service.create_sub_document(&caller, kind, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_sub_document(
    state: AppState,
    caller: Caller,
    kind: SubDocumentKind,
    id: String,
) -> Result<Json<Value>, CatalogError> {
    let id = sub_document_id(kind, &id)?;
    Ok(Json(state.service.get_sub_document(&caller, kind, id).await?))
}

async fn update_sub_document(
    state: AppState,
    caller: Caller,
    kind: SubDocumentKind,
    id: String,
    body: Value,
) -> Result<Json<Value>, CatalogError> {
    let id = sub_document_id(kind, &id)?;
    Ok(Json(
        state
            .service
            .update_sub_document(&caller, kind, id, body)
            .await?,
    ))
}

async fn delete_sub_document(
    state: AppState,
    caller: Caller,
    kind: SubDocumentKind,
    id: String,
) -> Result<StatusCode, CatalogError> {
    let id = sub_document_id(kind, &id)?;
    state.service.delete_sub_document(&caller, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates the HTTP router for the species catalog.
///
/// # Arguments
/// * `state` - The catalog the handlers delegate to
///
/// # Returns
/// An Axum Router with the species routes, one pair of routes per sub-document collection and
/// one read route per single-valued sub-document exposed under its species
pub fn create_species_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/species", get(list_species).post(create_species))
        .route(
            "/species/:id",
            get(get_species)
                .patch(update_species)
                .delete(delete_species),
        )
        .route("/species/:id/validate", patch(validate_species));
    for kind in SubDocumentKind::ALL {
        if let Some(segment) = kind.subresource() {
            router = router.route(
                &format!("/species/:id/{}", segment),
                get(
                    move |State(state): State<AppState>, caller: Caller, Path(id): Path<String>| async move {
                        get_species_sub_document(state, caller, kind, id).await
                    },
                ),
            );
        }
        router = router
            .route(
                &format!("/{}", kind.collection()),
                post(
                    move |State(state): State<AppState>,
                          caller: Caller,
                          JsonBody(body): JsonBody| async move {
                        create_sub_document(state, caller, kind, body).await
                    },
                ),
            )
            .route(
                &format!("/{}/:id", kind.collection()),
                get(
                    move |State(state): State<AppState>, caller: Caller, Path(id): Path<String>| async move {
                        get_sub_document(state, caller, kind, id).await
                    },
                )
                .patch(
                    move |State(state): State<AppState>,
                          caller: Caller,
                          Path(id): Path<String>,
                          JsonBody(body): JsonBody| async move {
                        update_sub_document(state, caller, kind, id, body).await
                    },
                )
                .delete(
                    move |State(state): State<AppState>, caller: Caller, Path(id): Path<String>| async move {
                        delete_sub_document(state, caller, kind, id).await
                    },
                ),
            );
    }
    router.with_state(state)
}
