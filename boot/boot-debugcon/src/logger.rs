use crate::debugcon_print;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Debug-port backend for the `log` façade.
pub struct DebugconLogger {
    max_level: LevelFilter,
}

impl DebugconLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install as the global logger. Call once during early init, before
    /// any placement work runs.
    #[allow(
        static_mut_refs,
        clippy::missing_errors_doc,
        clippy::missing_panics_doc
    )]
    pub fn init(self) -> Result<(), SetLoggerError> {
        // log::set_logger needs a &'static Log and there is no allocator
        // this early, so the instance lives in a static.
        static mut LOGGER: Option<DebugconLogger> = None;

        let max_level = self.max_level;
        // SAFETY: single-threaded boot stage; init runs once before traps
        // or placement can log.
        unsafe {
            LOGGER = Some(self);
            log::set_logger(LOGGER.as_ref().unwrap() as &'static dyn Log)?;
        }
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for DebugconLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        debugcon_print!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // unbuffered port, nothing to flush
    }
}
