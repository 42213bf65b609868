//! Logging sinks consumed by the runtime.

/// Four-severity text sink.
///
/// The runtime routes every message here: directly on the calling thread
/// until start-up completes, deferred through the dispatcher mailbox while
/// the run phase lasts, and directly again once teardown begins.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Stock sink: info/debug to stdout, warn/error to stderr.
pub struct SimpleLogger;

impl Logger for SimpleLogger {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn debug(&self, message: &str) {
        println!("-- {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("WARN: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("ERROR: {message}");
    }
}

/// Sink forwarding into the `log` facade, for hosts that already run a
/// `log`-based pipeline.
pub struct FacadeLogger;

impl Logger for FacadeLogger {
    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}
