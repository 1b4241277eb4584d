//! The identity of whoever is calling, passed explicitly into every core decision.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::CatalogError;

//////////////////////////////////////////////// Role //////////////////////////////////////////////

/// A role tag understood by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Unconditional access to every kind and state.
    Admin,
    /// A plain authenticated user.
    User,
    /// Elevated rights over fish.
    FishEditor,
    /// Elevated rights over plants.
    PlantEditor,
    /// Elevated rights over invertebrates.
    InvertebrateEditor,
}

impl Role {
    /// Every role tag.
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::User,
        Role::FishEditor,
        Role::PlantEditor,
        Role::InvertebrateEditor,
    ];

    /// The tag as carried in tokens.
    pub fn as_tag(self) -> &'static str {
        match self {
            Role::Admin => "ROLE_ADMIN",
            Role::User => "ROLE_USER",
            Role::FishEditor => "ROLE_FISH_EDITOR",
            Role::PlantEditor => "ROLE_PLANT_EDITOR",
            Role::InvertebrateEditor => "ROLE_INVERTEBRATE_EDITOR",
        }
    }

    /// Parses a tag; unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.as_tag() == tag)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_tag())
    }
}

/////////////////////////////////////////////// Caller /////////////////////////////////////////////

/// The resolved caller of one operation.
///
/// An anonymous caller has no identity and no roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    identity: Option<String>,
    roles: BTreeSet<Role>,
}

impl Caller {
    /// A caller that presented no credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated caller with the given roles.
    pub fn authenticated(
        identity: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            identity: Some(identity.into()),
            roles: roles.into_iter().collect(),
        }
    }

    /// An authenticated caller built from raw role tags.  Unrecognized tags are dropped.
    pub fn from_tags<S: AsRef<str>>(identity: impl Into<String>, tags: &[S]) -> Self {
        Self::authenticated(
            identity,
            tags.iter().filter_map(|t| Role::from_tag(t.as_ref())),
        )
    }

    /// Builds a caller from the payload segment of a bearer token.
    ///
    /// The signature is not checked here; the gateway in front of the catalog owns token
    /// verification.
    pub fn from_bearer_token(token: &str) -> Result<Self, CatalogError> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| {
                CatalogError::InvalidToken("expected three dot-separated segments".to_string())
            })?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| CatalogError::InvalidToken(e.to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| CatalogError::InvalidToken(e.to_string()))?;
        Ok(Self::from_tags(claims.id, claims.roles.as_slice()))
    }

    /// The caller's identity, if authenticated.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// True when the caller presented an identity.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// True when the caller holds `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The caller's roles.
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }
}

/// The claims the catalog reads from a bearer token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The caller's identity.
    pub id: String,
    /// Role tags such as `ROLE_FISH_EDITOR`.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Encodes the claims as an unsigned bearer token.
    ///
    /// Useful for local development and tests where no gateway signs tokens.
    pub fn to_unsigned_token(&self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default());
        format!("{}.{}.", header, payload)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = CatalogError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Caller::anonymous());
        };
        let header = header.to_str().map_err(|_| {
            CatalogError::InvalidToken("authorization header is not ascii".to_string())
        })?;
        match header.strip_prefix("Bearer ") {
            Some(token) => Caller::from_bearer_token(token.trim()),
            None => Ok(Caller::anonymous()),
        }
    }
}
