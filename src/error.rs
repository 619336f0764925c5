use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    ConfigurationError(String),
    StreamError(String),
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            AnalyticsError::StreamError(msg) => write!(f, "Stream error: {msg}"),
        }
    }
}

impl std::error::Error for AnalyticsError {}

impl From<crate::messaging::StreamError> for AnalyticsError {
    fn from(err: crate::messaging::StreamError) -> Self {
        AnalyticsError::StreamError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
