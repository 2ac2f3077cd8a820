use std::fmt;

/// Coarse failure categories shared by every error type in the crate.
///
/// Callers that only need to decide *what to tell the user* match on this
/// instead of on the concrete per-module error enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty prompt, unknown track name, non-positive duration.
    InvalidInput,
    /// A per-track operation was attempted before any session exists.
    NoActiveSession,
    /// An update or regeneration targeted a locked track.
    LockedTrackViolation,
    /// The generation port failed or produced unusable audio.
    GenerationFailure,
    /// A session could not be saved, loaded, or exported.
    PersistenceFailure,
}

impl ErrorKind {
    /// Short actionable message for the command-line boundary.
    pub fn hint(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input, check the prompt and track name",
            Self::NoActiveSession => "no active session, run `stemlock generate` first",
            Self::LockedTrackViolation => "track is locked, unlock it first",
            Self::GenerationFailure => "audio generation failed, try again",
            Self::PersistenceFailure => "session storage failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid input",
            Self::NoActiveSession => "no active session",
            Self::LockedTrackViolation => "locked track violation",
            Self::GenerationFailure => "generation failure",
            Self::PersistenceFailure => "persistence failure",
        };
        f.write_str(name)
    }
}
