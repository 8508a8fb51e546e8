//! Owner→delegate wiring over a weak slot.
//!
//! The owner never holds a strong reference to its delegate, so there is
//! no retain cycle, and once the delegate's real owner drops it the
//! slot observably reads null.

use std::sync::Arc;

use slog::{info, o, Drain, Logger};

use zeroweak::{delegate_accessors, WeakConfig, WeakReferent, WeakSlot};

trait DownloadDelegate: WeakReferent + Send + Sync {
    fn progressed(&self, percent: u8);
    fn finished(&self);
}

struct Download {
    delegate: WeakSlot<dyn DownloadDelegate>,
}

impl Download {
    delegate_accessors!(pub delegate: DownloadDelegate);

    fn run(&self) {
        for percent in (0u8..=100).step_by(25) {
            if let Some(delegate) = self.delegate() {
                delegate.progressed(percent);
            }
        }
        if let Some(delegate) = self.delegate() {
            delegate.finished();
        }
    }
}

struct ConsoleUi {
    logger: Logger,
}

impl WeakReferent for ConsoleUi {}

impl DownloadDelegate for ConsoleUi {
    fn progressed(&self, percent: u8) {
        info!(self.logger, "Download progressed"; "percent" => percent);
    }

    fn finished(&self) {
        info!(self.logger, "Download finished");
    }
}

fn main() {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let logger = Logger::root(
        slog_term::FullFormat::new(plain).build().fuse(),
        o!("demo" => "delegate"),
    );
    zeroweak::init(WeakConfig {
        logger: logger.clone(),
        backend: None,
    })
    .expect("runtime configured twice");

    let download = Download {
        delegate: WeakSlot::new(),
    };
    let ui: Arc<dyn DownloadDelegate> = Arc::new(ConsoleUi {
        logger: logger.clone(),
    });
    download.set_delegate(Some(&ui));
    download.run();

    drop(ui);
    assert!(download.delegate().is_none());
    info!(logger, "Delegate destroyed; slot reads null");
}
