use thiserror::Error;

/// Every way a single run can end early. None of these are retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data source error: {0}")]
    DataSource(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("delivery error: {0}")]
    Delivery(String),
}

impl DispatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data_source(message: impl Into<String>) -> Self {
        Self::DataSource(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    /// Stable name used in logs and in the trigger status record.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::DataSource(_) => "DataSourceError",
            Self::MalformedRecord(_) => "MalformedRecordError",
            Self::Delivery(_) => "DeliveryError",
        }
    }
}
