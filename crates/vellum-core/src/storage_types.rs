use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage driver types
///
/// A storage location (the backend identifier stored on each file) is backed by
/// one of these drivers. It's defined in core because configuration needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    S3,
    Local,
}

impl FromStr for StorageDriver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(StorageDriver::S3),
            "local" => Ok(StorageDriver::Local),
            _ => Err(anyhow::anyhow!("Invalid storage driver: {}", s)),
        }
    }
}

impl Display for StorageDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageDriver::S3 => write!(f, "s3"),
            StorageDriver::Local => write!(f, "local"),
        }
    }
}
