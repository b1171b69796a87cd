use serde::Serialize;
use std::fmt;

pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_NO_DEVICE: &str = "ERR_NO_DEVICE";
pub const ERR_DEPENDENCY: &str = "ERR_DEPENDENCY";
pub const ERR_PARSE: &str = "ERR_PARSE";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";

/// `error` is already worded for the MCP client; tool responses show it verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    /// Bad tool input caught before adb runs.
    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    pub fn no_device(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_NO_DEVICE, message, trace_id)
    }

    /// adb (or openssl) ran and reported failure.
    pub fn dependency(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DEPENDENCY, message, trace_id)
    }

    /// Device output we could not make sense of.
    pub fn parse(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_PARSE, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
