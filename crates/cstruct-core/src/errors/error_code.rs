//! CstructErrorCode trait for diagnostic reporting.

/// Every error enum implements this to provide a stable code string
/// that prefixes the diagnostic line written to stderr.
pub trait CstructErrorCode {
    /// Returns the error code string (e.g., "STORAGE_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted diagnostic: `[ERROR_CODE] message`.
    fn diagnostic(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const DB_BUSY: &str = "DB_BUSY";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const UNKNOWN_PARAMETER: &str = "UNKNOWN_PARAMETER";
pub const LOCK_ERROR: &str = "LOCK_ERROR";
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
pub const MALFORMED_MESSAGE: &str = "MALFORMED_MESSAGE";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
