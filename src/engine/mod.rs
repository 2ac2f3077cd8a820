//! The boundary to the text-to-audio backend.
//!
//! A [`GenerationPort`] is synchronous, blocking, and non-idempotent: the same
//! prompt may produce different audio on every call. The requested duration
//! is a request only; callers read the real length from [`GeneratedAudio`].

pub mod sketch;

use thiserror::Error;

use crate::error::ErrorKind;

pub use sketch::SketchEngine;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Invalid duration: {0}s (must be positive and finite)")]
    InvalidDuration(f64),
    #[error("Engine returned an empty buffer")]
    EmptyBuffer,
    #[error("Engine returned an invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Engine returned non-finite samples")]
    NonFiniteSamples,
    #[error("Engine failure: {0}")]
    Backend(String),
}

impl GenerateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDuration(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::GenerationFailure,
        }
    }
}

/// Mono PCM produced by one engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl GeneratedAudio {
    /// Actual length in seconds, derived from the buffer.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Reject output no caller could use.
    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.sample_rate == 0 {
            return Err(GenerateError::InvalidSampleRate(self.sample_rate));
        }
        if self.samples.is_empty() {
            return Err(GenerateError::EmptyBuffer);
        }
        if self.samples.iter().any(|s| !s.is_finite()) {
            return Err(GenerateError::NonFiniteSamples);
        }
        Ok(())
    }
}

/// A text-to-audio backend.
pub trait GenerationPort {
    /// Render `prompt` for roughly `duration_secs`. Implementations cap the
    /// length at their own maximum and report what they actually produced.
    fn generate(&mut self, prompt: &str, duration_secs: f64) -> Result<GeneratedAudio, GenerateError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "engine"
    }
}
