//! Owner stamping and modification timestamps.

use chrono::{DateTime, Utc};

use crate::caller::Caller;

/// An entity that records who created it.
pub trait Owned {
    /// The current owner, if any.
    fn owner(&self) -> Option<&str>;
    /// Overwrites the owner.  Callers go through [`stamp_owner`] instead.
    fn set_owner(&mut self, owner: String);
}

/// An entity that records when it was last persisted.
pub trait Timestamped {
    /// Sets `lastUpdate` to `now`.
    fn touch(&mut self, now: DateTime<Utc>);
}

/// Sets the owner of `entity` to the caller's identity when it has none yet.
///
/// Returns true when the owner changed.  Stamping twice is the same as stamping once, and an
/// anonymous caller never stamps anything.
pub fn stamp_owner<T: Owned + ?Sized>(entity: &mut T, caller: &Caller) -> bool {
    if entity.owner().is_some() {
        return false;
    }
    match caller.identity() {
        Some(identity) => {
            entity.set_owner(identity.to_string());
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::Role;
    use crate::kind::Kind;
    use crate::species::Species;

    #[test]
    fn stamps_unowned_entities() {
        let mut species = Species::new(Kind::Plant, Utc::now());
        let caller = Caller::authenticated("alice", [Role::User]);
        assert!(stamp_owner(&mut species, &caller));
        assert_eq!(species.owner.as_deref(), Some("alice"));
    }

    #[test]
    fn stamping_twice_is_stamping_once() {
        let mut species = Species::new(Kind::Plant, Utc::now());
        let alice = Caller::authenticated("alice", [Role::User]);
        let bob = Caller::authenticated("bob", [Role::Admin]);
        stamp_owner(&mut species, &alice);
        let once = species.clone();
        assert!(!stamp_owner(&mut species, &alice));
        assert!(!stamp_owner(&mut species, &bob));
        assert_eq!(species, once);
    }

    #[test]
    fn anonymous_never_stamps() {
        let mut species = Species::new(Kind::Fish, Utc::now());
        assert!(!stamp_owner(&mut species, &Caller::anonymous()));
        assert_eq!(species.owner, None);
    }

    #[test]
    fn touch_moves_last_update_only() {
        let created = Utc::now();
        let mut species = Species::new(Kind::Fish, created);
        let later = created + chrono::Duration::seconds(5);
        species.touch(later);
        assert_eq!(species.date_of_creation, created);
        assert_eq!(species.last_update, later);
    }
}
