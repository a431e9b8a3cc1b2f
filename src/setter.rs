//! Setter / initial-value mechanism.
//!
//! A setter owns a private, always-locked point of the target's type.
//! `update_from_setter` overwrites the target's value *and* validity from
//! that internal point — the only way to force a point back to "invalid"
//! without going through the lock-gated `write`/`set_invalid` path a
//! component would use.

use crate::point::{LockRequest, Point, PointValue};

/// A one-shot, locked source of truth for another point.
#[derive(Debug, Clone)]
pub struct Setter {
    internal: Point,
}

impl Setter {
    /// Builds a setter whose internal point starts `valid` (unless
    /// `initial_valid` says otherwise) and is locked from construction —
    /// it is never unlocked again.
    pub fn new(value: PointValue, initial_valid: bool) -> Self {
        let mut internal = Point::new(0, None, value.clone());
        if initial_valid {
            internal.write(value, LockRequest::Lock);
        } else {
            // The point starts unlocked, so the plain write is admitted
            // without locking; the lock is applied together with the
            // invalidation itself, since a *second* lock-gated call on an
            // already-locked point with `NoRequest` would be silently
            // discarded by the same truth table this type exists to
            // bypass for its targets.
            internal.write(value, LockRequest::NoRequest);
            internal.set_invalid(LockRequest::Lock);
        }
        Setter { internal }
    }

    /// Copies value + validity from the internal point into `dst`,
    /// bypassing `dst`'s own lock state entirely — this is the forcing
    /// function setters exist for, not a gated write. A locked target
    /// (e.g. an operator-locked IO register) must still be forceable at
    /// the start of every cycle; that is the whole point of a setter.
    pub fn set_value(&self, dst: &mut Point) {
        let (valid, value) = self.internal.read();
        dst.force_set(value, valid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_setter_forces_value_through_locked_target() {
        let setter = Setter::new(PointValue::Bool(true), true);
        let mut target = Point::new(1, None, PointValue::Bool(false));
        target.write(PointValue::Bool(false), LockRequest::Lock);
        setter.set_value(&mut target);
        assert_eq!(target.read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn invalid_setter_forces_target_invalid_even_if_locked() {
        let setter = Setter::new(PointValue::Bool(false), false);
        let mut target = Point::new(1, None, PointValue::Bool(true));
        target.write(PointValue::Bool(true), LockRequest::Lock);
        setter.set_value(&mut target);
        assert!(target.is_not_valid());
    }
}
