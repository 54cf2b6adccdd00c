use std::{error::Error, fmt, io};

use safetensors::SafeTensorError;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, ArtifactErr>;

/// Boxed failure reported by a collaborator (model backend, plotting backend).
pub type BoxedErr = Box<dyn Error + Send + Sync + 'static>;

/// Failures while writing or reading training artifacts.
#[derive(Debug)]
pub enum ArtifactErr {
    Io(io::Error),
    Json(serde_json::Error),
    SafeTensors(SafeTensorError),
    Shape(ndarray::ShapeError),
    UnsupportedDtype {
        tensor: String,
        dtype: String,
    },
    MissingMetadata {
        key: &'static str,
    },
    UnsupportedHistoryFormat {
        got: String,
    },
    UnsupportedHistoryVersion {
        got: u32,
        expected: u32,
    },
    /// A metric the line-based metrics file cannot hold.
    InvalidMetric {
        name: String,
        reason: &'static str,
    },
    MalformedMetrics {
        line: usize,
        content: String,
    },
    /// The model backend failed to serialize itself.
    Model(BoxedErr),
    /// The plotting backend failed to render a figure.
    Figure(BoxedErr),
}

impl fmt::Display for ArtifactErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactErr::Io(e) => write!(f, "io error: {e}"),
            ArtifactErr::Json(e) => write!(f, "json error: {e}"),
            ArtifactErr::SafeTensors(e) => write!(f, "safetensors error: {e}"),
            ArtifactErr::Shape(e) => write!(f, "tensor shape error: {e}"),
            ArtifactErr::UnsupportedDtype { tensor, dtype } => {
                write!(f, "tensor {tensor} has unsupported dtype {dtype}, expected F32")
            }
            ArtifactErr::MissingMetadata { key } => {
                write!(f, "missing metadata key: {key}")
            }
            ArtifactErr::UnsupportedHistoryFormat { got } => {
                write!(f, "not a training history document: format {got:?}")
            }
            ArtifactErr::UnsupportedHistoryVersion { got, expected } => write!(
                f,
                "unsupported history format version: got {got}, expected {expected}"
            ),
            ArtifactErr::InvalidMetric { name, reason } => {
                write!(f, "metric {name:?} cannot be written: {reason}")
            }
            ArtifactErr::MalformedMetrics { line, content } => {
                write!(f, "malformed metrics line {line}: {content:?}")
            }
            ArtifactErr::Model(e) => write!(f, "model serialization failed: {e}"),
            ArtifactErr::Figure(e) => write!(f, "figure rendering failed: {e}"),
        }
    }
}

impl Error for ArtifactErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArtifactErr::Io(e) => Some(e),
            ArtifactErr::Json(e) => Some(e),
            ArtifactErr::SafeTensors(e) => Some(e),
            ArtifactErr::Shape(e) => Some(e),
            ArtifactErr::Model(e) | ArtifactErr::Figure(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ArtifactErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ArtifactErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<SafeTensorError> for ArtifactErr {
    fn from(value: SafeTensorError) -> Self {
        Self::SafeTensors(value)
    }
}

impl From<ndarray::ShapeError> for ArtifactErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}
