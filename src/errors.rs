//! Error types for catalog operations.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::kind::{Kind, SubDocumentKind};
use crate::voter::AccessDenied;

/////////////////////////////////////////// DataStoreError /////////////////////////////////////////

/// Errors that can occur during data store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataStoreError {
    /// The requested item was not found in the data store.
    #[error("Item not found in data store")]
    NotFound,
    /// An item with the same identifier already exists.
    #[error("Item already exists in data store")]
    AlreadyExists,
    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// An internal storage system error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DataStoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DataStoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DataStoreError::AlreadyExists
            }
            _ => DataStoreError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataStoreError {
    fn from(e: serde_json::Error) -> Self {
        DataStoreError::SerializationError(e.to_string())
    }
}

///////////////////////////////////////////// Violation ////////////////////////////////////////////

/// One failed field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// The offending property path.
    pub property_path: String,
    /// Human readable description.
    pub message: String,
}

impl Violation {
    /// Creates a violation for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: field.into(),
            message: message.into(),
        }
    }
}

//////////////////////////////////////////// CatalogError //////////////////////////////////////////

/// Every way a catalog operation can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The species would hold a sub-document its kind forbids.
    #[error("A {kind} can not have a {property} property")]
    StructuralViolation {
        /// Kind of the species.
        kind: Kind,
        /// Property name of the forbidden sub-document.
        property: &'static str,
    },
    /// A write carried a `validationState` outside the legal set.
    #[error(r#"Valid states are ["posted","published"] . {value} is not valid"#)]
    InvalidStateValue {
        /// The rejected value, as received.
        value: String,
    },
    /// Publication was requested for a species that is not complete.
    #[error("Species has empty element. Can not be published.")]
    PublicationNotReady {
        /// Sub-documents still missing, in check order.
        missing: Vec<SubDocumentKind>,
    },
    /// The caller may not touch the species.
    #[error("{0}")]
    AccessDenied(AccessDenied),
    /// The bearer token could not be read.
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    /// One or more field constraints failed.
    #[error("{}", summarize(.0))]
    ConstraintViolation(Vec<Violation>),
    /// The body carried attributes that may not be written by this operation.
    #[error("Extra attributes are not allowed ({}).", quoted(.0))]
    ExtraAttributes(Vec<String>),
    /// The body could not be decoded.
    #[error("Invalid body: {0}")]
    InvalidBody(String),
    /// No such resource.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource type name.
        resource: &'static str,
        /// Requested identifier.
        id: String,
    },
    /// The species already holds a sub-document of this single-valued type.
    #[error("Species {species} already has its {property}")]
    AlreadyAttached {
        /// Target species.
        species: i64,
        /// Property name of the sub-document type.
        property: &'static str,
    },
    /// The storage layer failed.
    #[error("{0}")]
    Store(#[from] DataStoreError),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.property_path, v.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<AccessDenied> for CatalogError {
    fn from(denied: AccessDenied) -> Self {
        CatalogError::AccessDenied(denied)
    }
}

impl CatalogError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::StructuralViolation { .. }
            | Self::InvalidStateValue { .. }
            | Self::ConstraintViolation(_)
            | Self::ExtraAttributes(_)
            | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::AccessDenied(AccessDenied::Unauthorized) | Self::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::AccessDenied(AccessDenied::Forbidden) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } | Self::Store(DataStoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::PublicationNotReady { .. }
            | Self::AlreadyAttached { .. }
            | Self::Store(DataStoreError::AlreadyExists) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    title: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<Violation>,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "storage failure");
        }
        let detail = match &self {
            // Never leak backend messages.
            Self::Store(DataStoreError::Internal(_))
            | Self::Store(DataStoreError::SerializationError(_)) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let violations = match self {
            Self::ConstraintViolation(violations) => violations,
            _ => vec![],
        };
        let body = ErrorBody {
            title: "An error occurred",
            detail,
            violations,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = CatalogError::StructuralViolation {
            kind: Kind::Fish,
            property: "plantSpecs",
        };
        assert_eq!(err.to_string(), "A fish can not have a plantSpecs property");

        let err = CatalogError::InvalidStateValue {
            value: "draft".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"Valid states are ["posted","published"] . draft is not valid"#
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            CatalogError::AccessDenied(AccessDenied::Unauthorized).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CatalogError::AccessDenied(AccessDenied::Forbidden).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            CatalogError::PublicationNotReady { missing: vec![] }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CatalogError::Store(DataStoreError::Internal("boom".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            CatalogError::ExtraAttributes(vec!["owner".to_string()]).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn constraint_violations_are_summarized() {
        let err = CatalogError::ConstraintViolation(vec![
            Violation::new("phMin", "This value should not be blank."),
            Violation::new("phMax", "This value should not be blank."),
        ]);
        assert_eq!(
            err.to_string(),
            "phMin: This value should not be blank.\nphMax: This value should not be blank."
        );
    }

    #[test]
    fn already_attached_names_the_property() {
        let err = CatalogError::AlreadyAttached {
            species: 1,
            property: "animalSpecs",
        };
        assert_eq!(err.to_string(), "Species 1 already has its animalSpecs");
    }

    #[test]
    fn extra_attributes_are_quoted() {
        let err = CatalogError::ExtraAttributes(vec!["owner".to_string(), "id".to_string()]);
        assert_eq!(
            err.to_string(),
            r#"Extra attributes are not allowed ("owner", "id")."#
        );
    }
}
