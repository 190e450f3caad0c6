use std::fmt;
use thiserror::Error;

/// Which streaming pass was reading the source when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Transcode,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolve => write!(f, "link resolution"),
            Phase::Transcode => write!(f, "transcoding"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FbxError {
    #[error("malformed FB2 during {phase} at byte {position}: {message}")]
    SourceDecode {
        phase: Phase,
        position: u64,
        message: String,
    },

    #[error("cannot decode binary '{id}': {source}")]
    AssetDecode {
        id: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("cannot write '{entry}' to archive: {source}")]
    SinkWrite {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, FbxError>;

/// Catalog lookup failures. Never fatal to a conversion.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("no catalog record for book '{0}'")]
    UnknownBook(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}
