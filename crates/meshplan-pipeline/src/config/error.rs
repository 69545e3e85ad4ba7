use thiserror::Error;

/// Invalid parameter value, unknown file extension, or a duplicated device
/// SKU — surfaced by `validate()`, never by `Deserialize` itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("{section}.{field} must be {constraint}, got {value}")]
    OutOfRange { section: &'static str, field: &'static str, constraint: &'static str, value: String },

    #[error("duplicated device sku '{0}' in device_list")]
    DuplicateSku(String),

    #[error("device_list is empty")]
    EmptyDeviceList,

    #[error("unknown output file extension '{0}'")]
    UnknownExtension(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
