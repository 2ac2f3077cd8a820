use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AudioTrack, Provenance, SessionError, TrackSession};
use crate::classifier::MusicContext;
use crate::engine::GeneratedAudio;
use crate::error::ErrorKind;
use crate::track::{TrackMap, TrackType};

/// Bumped whenever the blob layout changes incompatibly.
/// v2: samples as base64 little-endian f32 instead of a JSON number array.
pub const FORMAT_VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Malformed session blob: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported session format version {found} (expected {expected})", expected = FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("Track '{track}' in session blob is invalid: {reason}")]
    InvalidTrack { track: TrackType, reason: String },
    #[error("Invalid session: {0}")]
    Session(#[from] SessionError),
}

impl PersistError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PersistenceFailure
    }
}

#[derive(Serialize, Deserialize)]
struct TrackRecord {
    sample_rate: u32,
    duration: f64,
    locked: bool,
    provenance: Provenance,
    #[serde(with = "pcm")]
    samples: Vec<f32>,
}

/// Samples as one base64 string of little-endian f32, about a quarter the
/// size of a JSON number array and bit-exact.
mod pcm {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(samples: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(D::Error::custom(format!(
                "sample data is {} bytes, not a whole number of f32",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[derive(Serialize, Deserialize)]
struct SessionRecord {
    version: u32,
    original_prompt: String,
    context: MusicContext,
    duration: f64,
    tracks: TrackMap<TrackRecord>,
}

/// Serialize the logical shape of a session to a JSON blob.
pub fn to_blob(session: &TrackSession) -> Result<Vec<u8>, PersistError> {
    let record = SessionRecord {
        version: FORMAT_VERSION,
        original_prompt: session.original_prompt().to_string(),
        context: session.context().clone(),
        duration: session.duration(),
        tracks: session.tracks.map(|t, track| TrackRecord {
            sample_rate: track.sample_rate(),
            duration: track.duration(),
            locked: session.is_locked(t),
            provenance: track.provenance().clone(),
            samples: track.samples().to_vec(),
        }),
    };
    Ok(serde_json::to_vec(&record)?)
}

/// Rebuild a session, lock states and provenance included.
pub fn from_blob(blob: &[u8]) -> Result<TrackSession, PersistError> {
    let record: SessionRecord = serde_json::from_slice(blob)?;
    if record.version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion { found: record.version });
    }

    let mut locked = Vec::new();
    let tracks = record.tracks.try_map(|t, rec| {
        if rec.locked {
            locked.push(t);
        }
        restore_track(t, rec)
    })?;

    let mut session = TrackSession::new(tracks, record.original_prompt, record.context)?;
    for t in locked {
        session.lock(t);
    }
    if (session.duration() - record.duration).abs() > 1e-6 {
        log::warn!(
            "Stored session duration {:.3}s differs from track data ({:.3}s)",
            record.duration,
            session.duration()
        );
    }
    Ok(session)
}

fn restore_track(track: TrackType, rec: TrackRecord) -> Result<AudioTrack, PersistError> {
    let audio = GeneratedAudio { samples: rec.samples, sample_rate: rec.sample_rate };
    audio.validate().map_err(|e| PersistError::InvalidTrack {
        track,
        reason: e.to_string(),
    })?;
    Ok(AudioTrack::new(track, audio, rec.provenance))
}
