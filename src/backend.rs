//! Backend capability detection and one-time process configuration.
//!
//! Which backend zeroes slots is decided once per process: lazily on the
//! first slot operation, or eagerly (and explicitly) via [init]. After that
//! the selection never changes, so every [WeakSlot](crate::WeakSlot) in the
//! process shares a single representation.

use once_cell::sync::OnceCell;
use slog::{info, o, Discard, Logger};

/// The mechanism used to zero weak slots when their referent is destroyed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backend {
    /// The platform's synchronized weak-reference primitive
    /// ([std::sync::Weak]).
    ///
    /// Loads either extend the referent's lifetime for the duration of the
    /// access or observe null; they can never observe a half-destroyed
    /// object, even while another thread is running the destructor.
    Native,
    /// Emulated zeroing through the registration table.
    ///
    /// Slots are zeroed by a teardown hook embedded in the referent, so a
    /// load racing the referent's destruction on another thread may still
    /// observe a stale pointer. Single-threaded use only; see the race
    /// window discussion in the crate-level docs.
    Fallback,
    /// Raw pointer assignment with no zeroing at all.
    ///
    /// The slot simply dangles after the referent is destroyed. This is
    /// the explicit "no protection" contract used when neither safer
    /// backend is enabled; loading a slot whose referent has been
    /// destroyed is undefined behavior, exactly as with a raw pointer.
    Raw,
}

struct Runtime {
    backend: Backend,
    logger: Logger,
}

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// One-time configuration for the weak-reference runtime.
///
/// Analogous to passing a logger and tuning flags to a collector at
/// startup; all fields have usable defaults and [init] is entirely
/// optional.
pub struct WeakConfig {
    /// Logger for backend selection and registration events.
    ///
    /// Defaults to a discarding logger.
    pub logger: Logger,
    /// Force a specific backend instead of consulting the capability
    /// detector.
    ///
    /// Forcing [Backend::Fallback] or [Backend::Raw] obligates the caller
    /// to uphold their documented (weaker) contracts.
    pub backend: Option<Backend>,
}

impl Default for WeakConfig {
    fn default() -> Self {
        WeakConfig {
            logger: Logger::root(Discard, o!()),
            backend: None,
        }
    }
}

/// An error configuring the weak-reference runtime.
///
/// Slot operations themselves are total and never fail; [init] is the
/// only fallible entry point.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// [init] was called twice, or after the first slot operation had
    /// already resolved the backend.
    #[error("weak-reference runtime already initialized")]
    AlreadyInitialized,
    /// The requested backend is not compiled in (or is refused in this
    /// execution environment).
    #[error("weak-reference backend {0:?} is unavailable in this build")]
    BackendUnavailable(Backend),
}

/// Whether the native synchronized primitive is usable in this build.
///
/// This is a build-time capability flag, not a runtime probe: the
/// primitive is assumed present whenever the `native-backend` feature is
/// enabled. Absence is a normal outcome, not a failure.
#[inline]
pub fn native_available() -> bool {
    cfg!(feature = "native-backend")
}

/// Whether the registration-table emulation may be selected.
///
/// Refuses emulated execution environments (Miri) where relying on
/// teardown ordering for memory safety would make the fallback's
/// documented race window impossible to avoid in practice.
#[inline]
fn fallback_permitted() -> bool {
    cfg!(feature = "fallback-backend") && !cfg!(miri)
}

fn detect() -> Backend {
    if native_available() {
        Backend::Native
    } else if fallback_permitted() {
        Backend::Fallback
    } else {
        Backend::Raw
    }
}

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime {
        backend: detect(),
        logger: Logger::root(Discard, o!()),
    })
}

/// Configure the weak-reference runtime for this process.
///
/// Must run before the first slot operation; afterwards the selection is
/// already cached and this returns [ConfigError::AlreadyInitialized].
pub fn init(config: WeakConfig) -> Result<(), ConfigError> {
    let forced = config.backend.is_some();
    let backend = match config.backend {
        Some(Backend::Native) if !native_available() => {
            return Err(ConfigError::BackendUnavailable(Backend::Native));
        }
        Some(Backend::Fallback) if !fallback_permitted() => {
            return Err(ConfigError::BackendUnavailable(Backend::Fallback));
        }
        Some(choice) => choice,
        None => detect(),
    };
    let runtime = Runtime {
        backend,
        logger: config.logger,
    };
    RUNTIME
        .set(runtime)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    if let Some(runtime) = RUNTIME.get() {
        info!(
            runtime.logger, "Selected weak-reference backend";
            "backend" => ?backend,
            "forced" => forced,
        );
    }
    Ok(())
}

/// The backend in effect for this process, resolving it if necessary.
#[inline]
pub fn selected() -> Backend {
    runtime().backend
}

#[cfg(feature = "fallback-backend")]
#[inline]
pub(crate) fn logger() -> &'static Logger {
    &runtime().logger
}
