//! Storage URI parsing.
//!
//! Recognized forms:
//! - `/some/path`, `relative/path`, `file:///some/path` - local filesystem
//! - `s3://bucket/prefix` - Amazon S3
//! - `gs://bucket/prefix` - Google Cloud Storage
//! - `az://container/prefix` - Azure Blob Storage
//! - `memory://` - process-local, for tests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// The family of a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    S3,
    Gcs,
    Azure,
    Memory,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
            BackendKind::Azure => "azure",
            BackendKind::Memory => "memory",
        }
    }

    pub fn is_cloud(self) -> bool {
        matches!(self, BackendKind::S3 | BackendKind::Gcs | BackendKind::Azure)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageUri {
    Local(PathBuf),
    /// A bucket or container plus a key prefix (possibly empty).
    Cloud {
        kind: BackendKind,
        bucket: String,
        prefix: String,
    },
    Memory,
}

impl StorageUri {
    /// Parse a storage URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(invalid(uri, "empty"));
        }

        if let Some(path) = uri.strip_prefix("file://") {
            if path.is_empty() {
                return Err(invalid(uri, "missing path"));
            }
            return Ok(StorageUri::Local(PathBuf::from(path)));
        }
        if uri == "memory://" || uri == "memory:" {
            return Ok(StorageUri::Memory);
        }

        let cloud = [
            ("s3://", BackendKind::S3),
            ("gs://", BackendKind::Gcs),
            ("az://", BackendKind::Azure),
        ];
        for (scheme, kind) in cloud {
            if let Some(rest) = uri.strip_prefix(scheme) {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(invalid(uri, "missing bucket"));
                }
                return Ok(StorageUri::Cloud {
                    kind,
                    bucket: bucket.to_string(),
                    prefix: prefix.trim_matches('/').to_string(),
                });
            }
        }

        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(invalid(uri, &format!("unsupported scheme {scheme:?}")));
        }
        Ok(StorageUri::Local(PathBuf::from(uri)))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            StorageUri::Local(_) => BackendKind::Local,
            StorageUri::Cloud { kind, .. } => *kind,
            StorageUri::Memory => BackendKind::Memory,
        }
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageUri::Local(path) => write!(f, "file://{}", path.display()),
            StorageUri::Cloud {
                kind,
                bucket,
                prefix,
            } => {
                let scheme = match kind {
                    BackendKind::S3 => "s3",
                    BackendKind::Gcs => "gs",
                    _ => "az",
                };
                if prefix.is_empty() {
                    write!(f, "{scheme}://{bucket}")
                } else {
                    write!(f, "{scheme}://{bucket}/{prefix}")
                }
            }
            StorageUri::Memory => f.write_str("memory://"),
        }
    }
}

fn invalid(uri: &str, reason: &str) -> StoreError {
    StoreError::InvalidUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_forms() {
        assert_eq!(
            StorageUri::parse("/var/chat").unwrap(),
            StorageUri::Local(PathBuf::from("/var/chat"))
        );
        assert_eq!(
            StorageUri::parse("file:///var/chat").unwrap(),
            StorageUri::Local(PathBuf::from("/var/chat"))
        );
        assert_eq!(
            StorageUri::parse("./data").unwrap(),
            StorageUri::Local(PathBuf::from("./data"))
        );
    }

    #[test]
    fn test_cloud_forms() {
        let uri = StorageUri::parse("s3://my-bucket/chat/prod/").unwrap();
        assert_eq!(
            uri,
            StorageUri::Cloud {
                kind: BackendKind::S3,
                bucket: "my-bucket".into(),
                prefix: "chat/prod".into(),
            }
        );
        assert_eq!(uri.to_string(), "s3://my-bucket/chat/prod");

        let uri = StorageUri::parse("gs://bucket").unwrap();
        assert_eq!(uri.kind(), BackendKind::Gcs);
        assert_eq!(uri.to_string(), "gs://bucket");

        let uri = StorageUri::parse("az://container/x").unwrap();
        assert_eq!(uri.kind(), BackendKind::Azure);
        assert!(uri.kind().is_cloud());
    }

    #[test]
    fn test_memory() {
        assert_eq!(StorageUri::parse("memory://").unwrap(), StorageUri::Memory);
    }

    #[test]
    fn test_rejected_forms() {
        assert!(StorageUri::parse("").is_err());
        assert!(StorageUri::parse("s3://").is_err());
        assert!(StorageUri::parse("file://").is_err());
        assert!(matches!(
            StorageUri::parse("ftp://host/x"),
            Err(StoreError::InvalidUri { .. })
        ));
    }
}
