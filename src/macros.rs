//! Accessor-generation sugar over [WeakSlot](crate::WeakSlot) fields.
//!
//! These are the thin conveniences layered on the facade: a
//! getter/setter pair for a weak field, and the owner→delegate pattern
//! where the owner must never extend the delegate's lifetime and the
//! field must read null once the delegate is gone.

/// Generate a getter/setter pair over a [WeakSlot](crate::WeakSlot)
/// field.
///
/// ## Example
/// ```
/// use std::sync::Arc;
/// use zeroweak::{WeakSlot, WeakReferent, weak_accessors};
///
/// struct DataSource(Vec<u8>);
/// impl WeakReferent for DataSource {}
///
/// struct View {
///     source: WeakSlot<DataSource>,
/// }
/// impl View {
///     weak_accessors!(pub fn source, pub fn set_source, source: DataSource);
/// }
///
/// let view = View { source: WeakSlot::new() };
/// let data = Arc::new(DataSource(vec![1, 2, 3]));
/// view.set_source(Some(&data));
/// assert!(view.source().map_or(false, |s| Arc::ptr_eq(&s, &data)));
/// ```
#[macro_export]
macro_rules! weak_accessors {
    ($getter_vis:vis fn $getter:ident, $setter_vis:vis fn $setter:ident, $field:ident: $target:ty) => {
        $getter_vis fn $getter(&self) -> ::std::option::Option<::std::sync::Arc<$target>> {
            self.$field.load()
        }
        $setter_vis fn $setter(
            &self,
            value: ::std::option::Option<&::std::sync::Arc<$target>>,
        ) {
            self.$field.store(value)
        }
    };
}

/// Generate `delegate()`, `set_delegate()` and `clear_delegate()` over a
/// `WeakSlot<dyn Protocol>` field.
///
/// The protocol must have [WeakReferent](crate::WeakReferent) as a
/// supertrait.
///
/// ## Example
/// ```
/// use std::sync::Arc;
/// use zeroweak::{WeakSlot, WeakReferent, delegate_accessors};
///
/// trait DownloadDelegate: WeakReferent + Send + Sync {
///     fn finished(&self);
/// }
///
/// struct Download {
///     delegate: WeakSlot<dyn DownloadDelegate>,
/// }
/// impl Download {
///     delegate_accessors!(pub delegate: DownloadDelegate);
///
///     fn complete(&self) {
///         if let Some(delegate) = self.delegate() {
///             delegate.finished();
///         }
///     }
/// }
/// # struct Ui;
/// # impl WeakReferent for Ui {}
/// # impl DownloadDelegate for Ui { fn finished(&self) {} }
/// let download = Download { delegate: WeakSlot::new() };
/// let ui: Arc<dyn DownloadDelegate> = Arc::new(Ui);
/// download.set_delegate(Some(&ui));
/// download.complete();
/// drop(ui);
/// assert!(download.delegate().is_none());
/// ```
#[macro_export]
macro_rules! delegate_accessors {
    ($vis:vis $field:ident: $protocol:path) => {
        $crate::weak_accessors!($vis fn delegate, $vis fn set_delegate, $field: dyn $protocol);

        $vis fn clear_delegate(&self) {
            self.$field.clear()
        }
    };
}
