use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model error: {message} (status: {status})")]
    Model { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    pub fn model(status: u16, message: impl Into<String>) -> Self {
        Self::Model {
            status,
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Stream(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::model(503, "endpoint warming up");
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("endpoint warming up"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::network("connection reset").is_retryable());
        assert!(Error::stream("transport error").is_retryable());
        assert!(!Error::config("missing endpoint").is_retryable());
        assert!(!Error::ThreadNotFound("t1".to_string()).is_retryable());
    }
}
