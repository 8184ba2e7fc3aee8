//! Error types for the variant ingest core.

use std::process::{ExitCode, Termination};

/// Errors raised by the variant factory, sample field extractor, and BGZF
/// stitcher.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AppError {
    /// Malformed `INFO` key, e.g. a non-integer `END`.
    #[error("could not parse INFO field {key:?} (value {value:?}): {reason}")]
    InfoParse {
        key: String,
        value: String,
        reason: String,
    },

    /// An alt allele looked like a breakend (it contains `[` or `]`) but
    /// matched neither the forward nor the reverse breakend grammar.
    #[error("alt allele {allele:?} looks like a breakend but matches no known grammar")]
    BreakendParse { allele: String },

    /// Classification produced a category with no registered variant
    /// creator. Always a programming error, never caused by input.
    #[error("internal error: unhandled variant category {category:?}")]
    UnknownCategory { category: String },

    /// A 7-bit-encoded length prefix in the sidecar index did not terminate
    /// within its advertised span (5 encoded bytes, covering a `u32`).
    #[error("7-bit encoded integer did not terminate within 5 bytes")]
    OptInt7bit,

    /// The BGZF layer could not read a well-formed block at the given file
    /// offset.
    #[error("corrupt BGZF block at file offset {offset}: {reason}")]
    BgzfCorrupt { offset: u64, reason: String },

    /// Propagated I/O failure from the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl Termination for AppError {
    fn report(self) -> ExitCode {
        match self {
            AppError::InfoParse { .. } => ExitCode::from(1),
            AppError::BreakendParse { .. } => ExitCode::from(1),
            AppError::UnknownCategory { .. } => ExitCode::from(70),
            AppError::OptInt7bit => ExitCode::from(1),
            AppError::BgzfCorrupt { .. } => ExitCode::from(1),
            AppError::Io(_) => ExitCode::from(1),
        }
    }
}
