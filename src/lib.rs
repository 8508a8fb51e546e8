//! Zeroing weak-reference slots.
//!
//! A [WeakSlot] holds a non-owning reference to an [Arc](std::sync::Arc)-owned
//! object. When the object's last strong owner releases it, every
//! outstanding slot pointing at it reads null instead of dangling. The
//! mechanism doing the zeroing is picked once per process by a capability
//! detector and cached:
//!
//! 1. [Backend::Native]: the platform's synchronized primitive
//!    ([std::sync::Weak]); zeroing is atomic with destruction and safe
//!    under arbitrary concurrency. Selected whenever the
//!    `native-backend` feature (default on) is enabled.
//! 2. [Backend::Fallback]: emulation via a registration table and
//!    referent-owned teardown sentinels, with a documented
//!    load-vs-teardown race window. Opt-in via the `fallback-backend`
//!    feature (default off) and strictly single-threaded use.
//! 3. [Backend::Raw]: raw pointer assignment with no zeroing at all,
//!    the explicit "no protection" contract used when neither safer
//!    option exists.
//!
//! The default-off fallback is deliberate: its race window is considered
//! worse than the degraded mode's honest absence of a guarantee, which
//! callers can at least reason about.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use zeroweak::{WeakSlot, WeakReferent};
//!
//! struct Session(&'static str);
//! impl WeakReferent for Session {}
//!
//! let slot = WeakSlot::new();
//! let session = Arc::new(Session("alice"));
//! slot.store(Some(&session));
//! assert!(slot.load().map_or(false, |s| Arc::ptr_eq(&s, &session)));
//!
//! drop(session);
//! // The last owner is gone; with the native backend the slot
//! // observably reads null
//! assert!(slot.load().is_none());
//! ```
//!
//! Referents implement the [WeakReferent] capability trait. For the
//! native backend it is a pure marker; types that want fallback
//! protection additionally embed a [SentinelList] and return it from
//! [WeakReferent::sentinel_list]. Delegate protocols declare
//! [WeakReferent] as a supertrait so `WeakSlot<dyn Protocol>` backs the
//! owner→delegate pattern without retain cycles; see
//! [delegate_accessors].

mod backend;
mod fallback;
mod macros;
mod native;
mod referent;
mod slot;

pub use self::backend::selected as selected_backend;
pub use self::backend::{init, native_available, Backend, ConfigError, WeakConfig};
pub use self::referent::{SentinelList, WeakReferent};
pub use self::slot::WeakSlot;
