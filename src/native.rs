//! The native backend: the platform's synchronized weak-reference
//! primitive.
//!
//! On this target the primitive is [std::sync::Weak]. Its zeroing is
//! synchronized with deallocation by the strong count itself: `upgrade`
//! either wins the count and extends the referent's lifetime for the
//! duration of the access, or observes zero and returns `None`. A load
//! therefore fully precedes or fully follows the destruction it races,
//! and can never see a partially-destroyed object.
//!
//! All operations are total; there are no error conditions.

use std::sync::{Arc, Weak};

/// The native representation of a slot: null or a registered weak handle.
///
/// `Option` rather than [Weak::new] because empty weak handles cannot be
/// constructed for unsized referents.
pub(crate) type NativeState<T> = Option<Weak<T>>;

#[inline]
pub(crate) fn load<T: ?Sized>(state: &NativeState<T>) -> Option<Arc<T>> {
    state.as_ref().and_then(Weak::upgrade)
}

/// Register `state` against `value`'s destruction. Passing `None` clears.
#[inline]
pub(crate) fn store<T: ?Sized>(state: &mut NativeState<T>, value: Option<&Arc<T>>) {
    *state = value.map(Arc::downgrade);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn upgrade_fails_after_last_owner() {
        let value = Arc::new("referent");
        let mut state = None;
        store(&mut state, Some(&value));
        assert!(load(&state).map_or(false, |v| Arc::ptr_eq(&v, &value)));
        drop(value);
        assert!(load(&state).is_none());
    }

    #[test]
    fn storing_none_clears() {
        let value = Arc::new(17u32);
        let mut state = Some(Arc::downgrade(&value));
        store(&mut state, None);
        assert!(load(&state).is_none());
    }
}
