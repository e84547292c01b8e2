//! Error types shared by every layer
//!
//! Facade validation failures carry one of the [`ErrorKind`] tags;
//! I/O, serialization and driver failures pass through unchanged.

use std::fmt;

/// Error kind tag attached to validation and lookup failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingKey,
    MissingValue,
    MissingDriver,
    ParseException,
    InvalidType,
    InstanceNotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingKey => "MISSING_KEY",
            ErrorKind::MissingValue => "MISSING_VALUE",
            ErrorKind::MissingDriver => "MISSING_DRIVER",
            ErrorKind::ParseException => "PARSE_EXCEPTION",
            ErrorKind::InvalidType => "INVALID_TYPE",
            ErrorKind::InstanceNotFound => "INSTANCE_NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value store error
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("missing value: {0}")]
    MissingValue(String),

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("missing driver: {0}")]
    MissingDriver(String),

    #[error("no singleton instance registered under \"{0}\"")]
    InstanceNotFound(String),

    #[error("corrupt database: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("failed to connect {driver} driver: {source}")]
    Connect {
        driver: String,
        #[source]
        source: Box<KvError>,
    },
}

impl KvError {
    /// Kind tag for validation failures; `None` for pass-through errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            KvError::InvalidType(_) => Some(ErrorKind::InvalidType),
            KvError::MissingValue(_) => Some(ErrorKind::MissingValue),
            KvError::MissingKey(_) => Some(ErrorKind::MissingKey),
            KvError::MissingDriver(_) => Some(ErrorKind::MissingDriver),
            KvError::InstanceNotFound(_) => Some(ErrorKind::InstanceNotFound),
            KvError::Parse(_) => Some(ErrorKind::ParseException),
            _ => None,
        }
    }

    /// Wrap a failure raised while opening a driver connection.
    pub fn connect(driver: impl Into<String>, source: KvError) -> Self {
        KvError::Connect {
            driver: driver.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, KvError>;
