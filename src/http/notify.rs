//! Hook for whatever displays the application's current error
//!
//! The client calls [`ErrorDisplay::clear`] whenever a request comes back with
//! an error status, before any session handling runs.

#[cfg(test)]
use mockall::automock;

/// Receiver of "clear the displayed error" notifications
#[cfg_attr(test, automock)]
pub trait ErrorDisplay {
    /// Drop any error currently shown to the user
    fn clear(&self);
}

/// Display that ignores notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorDisplay;

impl ErrorDisplay for NoopErrorDisplay {
    fn clear(&self) {}
}

/// Display that only records the clear in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorDisplay;

impl ErrorDisplay for TracingErrorDisplay {
    fn clear(&self) {
        tracing::trace!("clearing displayed error");
    }
}
