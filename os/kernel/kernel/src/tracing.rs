//! # Kernel Log Setup

use kernel_qemu::QemuLogger;
use log::{LevelFilter, warn};

static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Trace);

/// Route `log` records to the QEMU debug console, filtered at `level`.
///
/// A second call only adjusts the level.
pub fn init_logging(level: LevelFilter) {
    if LOGGER.init().is_err() {
        warn!("logger already installed");
    }
    log::set_max_level(level);
}
