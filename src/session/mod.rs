//! The four-track session and its lock state machine.
//!
//! Track payloads are immutable and cheaply shareable; lock flags live in a
//! separate map owned by the session, so a copied [`AudioTrack`] can never
//! carry a stale lock. Every mutation of a track slot goes through
//! [`TrackSession::update`], which refuses locked tracks.

pub mod persist;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::MusicContext;
use crate::engine::GeneratedAudio;
use crate::error::ErrorKind;
use crate::track::{TrackMap, TrackType};

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("Unknown track '{0}' (expected drums, bass, harmony, or melody)")]
    UnknownTrack(String),
    #[error("Track '{0}' is locked; unlock it first")]
    Locked(TrackType),
    #[error("Cannot put a {found} track into the {expected} slot")]
    TrackTypeMismatch { expected: TrackType, found: TrackType },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTrack(_) | Self::TrackTypeMismatch { .. } => ErrorKind::InvalidInput,
            Self::Locked(_) => ErrorKind::LockedTrackViolation,
        }
    }
}

/// Where a track came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// The exact prompt sent to the engine.
    pub prompt_used: String,
    /// What the user asked for: the session prompt, or a regeneration description.
    pub source_description: String,
    pub generated_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(prompt_used: impl Into<String>, source_description: impl Into<String>) -> Self {
        Self {
            prompt_used: prompt_used.into(),
            source_description: source_description.into(),
            generated_at: Utc::now(),
        }
    }
}

/// One generated stem. Never mutated; regeneration replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    track_type: TrackType,
    samples: Arc<[f32]>,
    sample_rate: u32,
    provenance: Provenance,
}

impl AudioTrack {
    pub fn new(track_type: TrackType, audio: GeneratedAudio, provenance: Provenance) -> Self {
        Self {
            track_type,
            samples: audio.samples.into(),
            sample_rate: audio.sample_rate,
            provenance,
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Seconds, from the sample count.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn rms_energy(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum_sq / self.samples.len() as f64).sqrt() as f32
    }

    /// True when both handles point at the same buffer.
    pub fn shares_buffer(&self, other: &AudioTrack) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

/// Descriptive metadata of one locked track.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedTrackSummary {
    pub track_type: TrackType,
    pub provenance: Provenance,
    pub duration: f64,
    pub sample_rate: u32,
    pub rms_energy: f32,
}

/// Everything the composer needs to know about locked tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockedContext {
    pub tracks: Vec<LockedTrackSummary>,
}

impl LockedContext {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_types(&self) -> Vec<TrackType> {
        self.tracks.iter().map(|t| t.track_type).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackStatus {
    pub track_type: TrackType,
    pub locked: bool,
    pub duration: f64,
    pub source_description: String,
}

/// Read-only snapshot for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub original_prompt: String,
    pub duration: f64,
    pub tracks: Vec<TrackStatus>,
    pub locked_count: usize,
}

/// A generated arrangement: four tracks, their locks, and the context they
/// were generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSession {
    tracks: TrackMap<AudioTrack>,
    locks: TrackMap<bool>,
    original_prompt: String,
    context: MusicContext,
}

impl TrackSession {
    /// New session with every track unlocked. Fails if a track sits in the
    /// wrong slot.
    pub fn new(
        tracks: TrackMap<AudioTrack>,
        original_prompt: impl Into<String>,
        context: MusicContext,
    ) -> Result<Self, SessionError> {
        for (slot, track) in tracks.iter() {
            if track.track_type() != slot {
                return Err(SessionError::TrackTypeMismatch {
                    expected: slot,
                    found: track.track_type(),
                });
            }
        }
        Ok(Self {
            tracks,
            locks: TrackMap::default(),
            original_prompt: original_prompt.into(),
            context,
        })
    }

    pub fn track(&self, track: TrackType) -> &AudioTrack {
        self.tracks.get(track)
    }

    pub fn tracks(&self) -> impl Iterator<Item = (TrackType, &AudioTrack)> {
        self.tracks.iter()
    }

    pub fn original_prompt(&self) -> &str {
        &self.original_prompt
    }

    pub fn context(&self) -> &MusicContext {
        &self.context
    }

    /// Longest track, in seconds.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(|(_, t)| t.duration())
            .fold(0.0, f64::max)
    }

    pub fn is_locked(&self, track: TrackType) -> bool {
        *self.locks.get(track)
    }

    /// unlocked → locked. No-op when already locked.
    pub fn lock(&mut self, track: TrackType) {
        let slot = self.locks.get_mut(track);
        if !*slot {
            log::info!("Locked {track}");
            *slot = true;
        }
    }

    /// locked → unlocked. No-op when already unlocked.
    pub fn unlock(&mut self, track: TrackType) {
        let slot = self.locks.get_mut(track);
        if *slot {
            log::info!("Unlocked {track}");
            *slot = false;
        }
    }

    /// The one place the lock invariant is checked.
    pub fn ensure_unlocked(&self, track: TrackType) -> Result<(), SessionError> {
        if self.is_locked(track) {
            return Err(SessionError::Locked(track));
        }
        Ok(())
    }

    /// Replace an unlocked track. The old buffer is dropped, not merged.
    pub fn update(&mut self, track: TrackType, new_track: AudioTrack) -> Result<(), SessionError> {
        self.ensure_unlocked(track)?;
        if new_track.track_type() != track {
            return Err(SessionError::TrackTypeMismatch {
                expected: track,
                found: new_track.track_type(),
            });
        }
        *self.tracks.get_mut(track) = new_track;
        log::info!("Updated {track}");
        Ok(())
    }

    pub fn locked_tracks(&self) -> Vec<TrackType> {
        TrackType::ALL.into_iter().filter(|t| self.is_locked(*t)).collect()
    }

    pub fn unlocked_tracks(&self) -> Vec<TrackType> {
        TrackType::ALL.into_iter().filter(|t| !self.is_locked(*t)).collect()
    }

    /// Metadata of every locked track, in canonical order.
    pub fn locked_context(&self) -> LockedContext {
        let tracks = self
            .locked_tracks()
            .into_iter()
            .map(|t| {
                let track = self.track(t);
                LockedTrackSummary {
                    track_type: t,
                    provenance: track.provenance().clone(),
                    duration: track.duration(),
                    sample_rate: track.sample_rate(),
                    rms_energy: track.rms_energy(),
                }
            })
            .collect();
        LockedContext { tracks }
    }

    pub fn status(&self) -> SessionStatus {
        let tracks: Vec<TrackStatus> = self
            .tracks
            .iter()
            .map(|(t, track)| TrackStatus {
                track_type: t,
                locked: self.is_locked(t),
                duration: track.duration(),
                source_description: track.provenance().source_description.clone(),
            })
            .collect();
        SessionStatus {
            original_prompt: self.original_prompt.clone(),
            duration: self.duration(),
            locked_count: tracks.iter().filter(|t| t.locked).count(),
            tracks,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::analyze;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    pub(crate) fn test_track(track_type: TrackType, value: f32, len: usize) -> AudioTrack {
        AudioTrack::new(
            track_type,
            GeneratedAudio { samples: vec![value; len], sample_rate: 1000 },
            Provenance::new(format!("{} prompt", track_type.isolation_phrase()), "test"),
        )
    }

    pub(crate) fn test_session() -> TrackSession {
        let tracks = TrackMap::from_fn(|t| test_track(t, 0.1, 1000));
        TrackSession::new(tracks, "chill lo-fi at 72 bpm", analyze("chill lo-fi at 72 bpm")).unwrap()
    }

    #[test]
    fn starts_unlocked() {
        let session = test_session();
        assert!(session.locked_tracks().is_empty());
        assert_eq!(session.unlocked_tracks(), TrackType::ALL.to_vec());
        assert!(session.locked_context().is_empty());
    }

    #[test]
    fn lock_and_unlock_are_idempotent() {
        let mut session = test_session();
        session.lock(TrackType::Bass);
        session.lock(TrackType::Bass);
        assert_eq!(session.locked_tracks(), vec![TrackType::Bass]);
        session.unlock(TrackType::Bass);
        session.unlock(TrackType::Bass);
        assert!(!session.is_locked(TrackType::Bass));
    }

    #[test]
    fn update_locked_track_fails_and_leaves_it_alone() {
        let mut session = test_session();
        let before = session.track(TrackType::Bass).clone();
        session.lock(TrackType::Bass);

        let err = session
            .update(TrackType::Bass, test_track(TrackType::Bass, 0.5, 10))
            .unwrap_err();
        assert_eq!(err, SessionError::Locked(TrackType::Bass));
        assert_eq!(err.kind(), ErrorKind::LockedTrackViolation);
        assert!(session.track(TrackType::Bass).shares_buffer(&before));
        assert!(session.is_locked(TrackType::Bass));
    }

    #[test]
    fn update_unlocked_track_replaces_it() {
        let mut session = test_session();
        let replacement = test_track(TrackType::Drums, 0.5, 2000);
        session.update(TrackType::Drums, replacement.clone()).unwrap();
        assert!(session.track(TrackType::Drums).shares_buffer(&replacement));
        assert!((session.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn update_rejects_wrong_slot() {
        let mut session = test_session();
        let err = session
            .update(TrackType::Drums, test_track(TrackType::Melody, 0.5, 10))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::TrackTypeMismatch { expected: TrackType::Drums, found: TrackType::Melody }
        );
    }

    #[test]
    fn new_rejects_misplaced_tracks() {
        let tracks = TrackMap::from_fn(|_| test_track(TrackType::Drums, 0.1, 10));
        assert!(matches!(
            TrackSession::new(tracks, "x", analyze("x")),
            Err(SessionError::TrackTypeMismatch { expected: TrackType::Bass, .. })
        ));
    }

    #[test]
    fn locked_context_describes_locked_tracks_only() {
        let mut session = test_session();
        session.lock(TrackType::Melody);
        session.lock(TrackType::Bass);
        let ctx = session.locked_context();
        assert_eq!(ctx.track_types(), vec![TrackType::Bass, TrackType::Melody]);
        let bass = &ctx.tracks[0];
        assert_eq!(bass.sample_rate, 1000);
        assert!((bass.duration - 1.0).abs() < 1e-12);
        assert!((bass.rms_energy - 0.1).abs() < 1e-6);
        assert_eq!(bass.provenance.prompt_used, "bass line only prompt");
    }

    #[test]
    fn status_reflects_lock_snapshot() {
        let mut session = test_session();
        session.lock(TrackType::Harmony);
        let status = session.status();
        assert_eq!(status.locked_count, 1);
        assert_eq!(status.original_prompt, "chill lo-fi at 72 bpm");
        let harmony = status.tracks.iter().find(|t| t.track_type == TrackType::Harmony).unwrap();
        assert!(harmony.locked);
        assert_eq!(status.tracks.len(), 4);
        // Reading status has no side effects
        assert_eq!(session.status(), status);
    }

    #[test]
    fn lock_invariant_holds_over_long_call_sequences() {
        let mut session = test_session();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for step in 0..2000 {
            let track = TrackType::ALL[rng.gen_range(0..TrackType::ALL.len())];
            let before = session.clone();
            match rng.gen_range(0..3) {
                0 => session.lock(track),
                1 => session.unlock(track),
                _ => {
                    let new_track = test_track(track, (step % 7) as f32 * 0.1, 100 + step);
                    let result = session.update(track, new_track);
                    assert_eq!(result.is_err(), before.is_locked(track));
                }
            }
            // Without an unlock, a locked track is untouched
            for t in before.locked_tracks() {
                if session.is_locked(t) {
                    assert!(session.track(t).shares_buffer(before.track(t)));
                    assert_eq!(session.track(t), before.track(t));
                }
            }
        }
    }
}
