use std::fmt;

use crate::options::{Codec, Packaging};

/// Errors surfaced at the library's API boundary.
///
/// Per the design, only invalid-argument-class failures are ever returned as
/// `Err`. Stream truncation, malformed syntax, and parity failures are absorbed
/// internally (logged, never surfaced) and parity/garbage input simply yields an
/// empty or zeroed result instead of an error.
#[derive(Debug)]
pub enum CeaError {
    /// A caller-supplied argument was invalid (negative count, bad channel, etc).
    InvalidArgument(String),
    /// `feed_packet` was called before `set_demuxer`.
    DemuxerNotConfigured,
    /// The codec/packaging combination is not supported.
    UnsupportedPackaging { codec: Codec, packaging: Packaging },
}

impl fmt::Display for CeaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeaError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            CeaError::DemuxerNotConfigured => {
                write!(f, "feed_packet called before set_demuxer")
            }
            CeaError::UnsupportedPackaging { codec, packaging } => write!(
                f,
                "unsupported packaging: {codec:?} cannot be carried as {packaging:?}"
            ),
        }
    }
}

impl std::error::Error for CeaError {}

pub type CeaResult<T> = Result<T, CeaError>;
