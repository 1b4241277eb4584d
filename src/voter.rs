//! Single-item read decisions for species that are not published.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::kind::Kind;
use crate::rights::AccessRights;
use crate::species::Species;

/// Why a read was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// The caller did not authenticate.
    Unauthorized,
    /// The caller authenticated but lacks the rights.
    Forbidden,
}

impl Display for AccessDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AccessDenied::Unauthorized => {
                write!(f, "Full authentication is required to access this resource.")
            }
            AccessDenied::Forbidden => write!(f, "Access Denied."),
        }
    }
}

/// Votes on reading an unpublished species of `kind`.
pub fn vote_on_read(rights: &AccessRights, kind: Kind) -> Result<(), AccessDenied> {
    if !rights.is_authenticated() {
        return Err(AccessDenied::Unauthorized);
    }
    if rights.is_admin() || rights.is_editor_of(kind) {
        return Ok(());
    }
    Err(AccessDenied::Forbidden)
}

/// Decides whether the caller may read `species`.  Published species are always readable.
pub fn authorize_read(rights: &AccessRights, species: &Species) -> Result<(), AccessDenied> {
    if species.is_published() {
        return Ok(());
    }
    vote_on_read(rights, species.kind)
}
