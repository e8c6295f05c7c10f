//! Typed failures for wheel content rewriting.
use std::io;
use std::path::PathBuf;

/// Errors raised while rewriting a wheel archive.
///
/// I/O and zip failures mean the archive could not be read or written;
/// the remaining variants mean the archive opened fine but does not look
/// like a well-formed wheel.
#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("wheel file name has fewer than two tokens: {0}")]
    InvalidName(String),

    #[error("archive entry escapes the archive root: {0}")]
    UnsafeEntry(String),

    #[error("archive entry is a symlink: {0}")]
    SymlinkEntry(String),

    #[error("no .dist-info directory found in {}", .0.display())]
    MissingMetadataDir(PathBuf),

    #[error("multiple .dist-info directories found in {}: {}", .archive.display(), .candidates.join(", "))]
    AmbiguousMetadataDir {
        archive: PathBuf,
        candidates: Vec<String>,
    },

    #[error("{dist_info}/METADATA is missing")]
    MissingMetadataFile { dist_info: String },

    #[error("{dist_info}/METADATA has no Version: field")]
    MissingVersionField { dist_info: String },
}

impl WheelError {
    /// True for the malformed-archive tier (the archive itself is readable).
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            WheelError::UnsafeEntry(_)
                | WheelError::SymlinkEntry(_)
                | WheelError::MissingMetadataDir(_)
                | WheelError::AmbiguousMetadataDir { .. }
                | WheelError::MissingMetadataFile { .. }
                | WheelError::MissingVersionField { .. }
        )
    }
}
