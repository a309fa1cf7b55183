// src/logger.rs
//! Logger collaborator for failed runtime operations

use std::sync::Arc;

/// Receives one error-level message per failed encrypt / decrypt call
pub trait ErrorLogger {
    fn log_error(&self, message: &str);
}

/// Forwards to `tracing::error!`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn log_error(&self, message: &str) {
        tracing::error!(target: "pgp_encrypter", "{message}");
    }
}

impl<L: ErrorLogger + ?Sized> ErrorLogger for Arc<L> {
    fn log_error(&self, message: &str) {
        (**self).log_error(message);
    }
}

impl<L: ErrorLogger + ?Sized> ErrorLogger for &L {
    fn log_error(&self, message: &str) {
        (**self).log_error(message);
    }
}

impl<L: ErrorLogger + ?Sized> ErrorLogger for Box<L> {
    fn log_error(&self, message: &str) {
        (**self).log_error(message);
    }
}
