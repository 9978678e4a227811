//! 同步过程中的错误分类。
//!
//! 除 404/403（issue 不可见）外，任何错误都会中止整个同步。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::redmine::transport::TransportError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cannot resolve max issue number: {0}")]
    RangeResolution(String),
    #[error("request {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("{status}: {url}")]
    Status { status: String, url: String },
    #[error("decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected redmine download url: {0}")]
    MalformedAttachmentUrl(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rename {from} -> {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
