use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::classifier;
use crate::composer;
use crate::engine::{GenerateError, GeneratedAudio, GenerationPort};
use crate::error::ErrorKind;
use crate::session::{AudioTrack, Provenance, SessionError, TrackSession};
use crate::track::{TrackMap, TrackType};

#[derive(Error, Debug)]
pub enum WorkstationError {
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("Invalid duration: {0}s (must be positive and finite)")]
    InvalidDuration(f64),
    #[error("No active session")]
    NoActiveSession,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Generating {track} failed: {source}")]
    Generation {
        track: TrackType,
        #[source]
        source: GenerateError,
    },
}

impl WorkstationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPrompt | Self::InvalidDuration(_) => ErrorKind::InvalidInput,
            Self::NoActiveSession => ErrorKind::NoActiveSession,
            Self::Session(e) => e.kind(),
            Self::Generation { .. } => ErrorKind::GenerationFailure,
        }
    }
}

/// Drives generation: prompt → context → per-track prompts → engine calls →
/// session.
///
/// Holds no session of its own. `generate` hands back a new session and the
/// caller passes it into `regenerate`, so a failed call can never disturb a
/// session the caller already has. The engine sits behind a mutex so only
/// one render is ever in flight against it.
pub struct Workstation<P> {
    port: Mutex<P>,
}

impl<P: GenerationPort> Workstation<P> {
    pub fn new(port: P) -> Self {
        Self { port: Mutex::new(port) }
    }

    /// Build a new four-track session from a prompt.
    ///
    /// Tracks are rendered in canonical order (drums, bass, harmony, melody).
    /// All-or-nothing: if any render fails, no session is returned.
    pub fn generate(&self, prompt: &str, duration_secs: f64) -> Result<TrackSession, WorkstationError> {
        if prompt.trim().is_empty() {
            return Err(WorkstationError::EmptyPrompt);
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(WorkstationError::InvalidDuration(duration_secs));
        }

        let context = classifier::analyze(prompt);
        let prompts = composer::compose(&context);
        log::info!(
            "Generating {:.1}s session: genre={} tempo={:?}",
            duration_secs, context.genre, context.tempo
        );

        let pb = progress_bar(TrackType::ALL.len() as u64);
        let tracks = TrackMap::try_from_fn(|track| {
            pb.set_message(format!("Generating {track}..."));
            let track_prompt = prompts.get(track);
            let audio = self.render(track, track_prompt, duration_secs)?;
            pb.inc(1);
            Ok::<_, WorkstationError>(AudioTrack::new(
                track,
                audio,
                Provenance::new(track_prompt.clone(), prompt),
            ))
        });
        let tracks = match tracks {
            Ok(tracks) => tracks,
            Err(e) => {
                pb.abandon_with_message("Generation failed");
                return Err(e);
            }
        };
        pb.finish_with_message("Done");

        Ok(TrackSession::new(tracks, prompt, context)?)
    }

    /// Replace one unlocked track with a fresh render.
    ///
    /// The prompt reuses the session's original context and adds a tempo/key
    /// matching clause when anything is locked. An empty description falls
    /// back to a generic "different pattern" request.
    pub fn regenerate<'s>(
        &self,
        session: &'s mut TrackSession,
        track: TrackType,
        description: &str,
    ) -> Result<&'s AudioTrack, WorkstationError> {
        // Fail before spending a render on a track that cannot be replaced
        session.ensure_unlocked(track)?;

        let description = match description.trim() {
            "" => composer::default_regeneration_description(track),
            d => d.to_string(),
        };
        let locked = session.locked_context();
        let prompt = composer::compose_regeneration(track, &description, &locked, session.context());
        log::info!(
            "Regenerating {track} ({} locked: {:?})",
            locked.tracks.len(),
            locked.track_types()
        );

        let audio = self.render(track, &prompt, session.duration())?;
        let new_track = AudioTrack::new(track, audio, Provenance::new(prompt, description));
        session.update(track, new_track)?;
        Ok(session.track(track))
    }

    /// `regenerate` for callers holding an optional session and a raw track
    /// name, checking in order: session exists, name is a track, track is
    /// unlocked.
    pub fn regenerate_named<'s>(
        &self,
        session: Option<&'s mut TrackSession>,
        track_name: &str,
        description: &str,
    ) -> Result<&'s AudioTrack, WorkstationError> {
        let session = session.ok_or(WorkstationError::NoActiveSession)?;
        let track: TrackType = track_name.parse()?;
        self.regenerate(session, track, description)
    }

    fn render(&self, track: TrackType, prompt: &str, duration_secs: f64) -> Result<GeneratedAudio, WorkstationError> {
        let mut port = self.port.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log::debug!("{} <- {:?} ({:.1}s)", port.name(), prompt, duration_secs);
        port.generate(prompt, duration_secs)
            .and_then(|audio| audio.validate().map(|()| audio))
            .map_err(|source| WorkstationError::Generation { track, source })
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:20.cyan/blue}] {pos}/{len} ({elapsed}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every prompt; fills each buffer with the call number so
    /// replaced tracks are easy to tell apart.
    struct FakePort {
        calls: Rc<RefCell<Vec<String>>>,
        fail_on_call: Option<usize>,
        /// Fraction of the requested duration actually produced.
        yield_ratio: f64,
    }

    const RATE: u32 = 1000;

    impl GenerationPort for FakePort {
        fn generate(&mut self, prompt: &str, duration_secs: f64) -> Result<GeneratedAudio, GenerateError> {
            let mut calls = self.calls.borrow_mut();
            calls.push(prompt.to_string());
            let n = calls.len();
            if self.fail_on_call == Some(n) {
                return Err(GenerateError::Backend("out of memory".to_string()));
            }
            let len = (duration_secs * self.yield_ratio * RATE as f64) as usize;
            Ok(GeneratedAudio { samples: vec![n as f32; len], sample_rate: RATE })
        }
    }

    fn workstation(fail_on_call: Option<usize>) -> (Workstation<FakePort>, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let port = FakePort { calls: Rc::clone(&calls), fail_on_call, yield_ratio: 1.0 };
        (Workstation::new(port), calls)
    }

    const EXAMPLE: &str =
        "chill lo-fi hip-hop beat at 72 BPM with jazzy chords and warm analog bass";

    #[test]
    fn empty_prompt_is_rejected_without_rendering() {
        let (ws, calls) = workstation(None);
        let err = ws.generate("   ", 8.0).unwrap_err();
        assert!(matches!(err, WorkstationError::EmptyPrompt));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let (ws, _) = workstation(None);
        assert!(matches!(ws.generate(EXAMPLE, 0.0), Err(WorkstationError::InvalidDuration(_))));
        assert!(matches!(ws.generate(EXAMPLE, f64::INFINITY), Err(WorkstationError::InvalidDuration(_))));
    }

    #[test]
    fn generate_renders_four_tracks_in_order() {
        let (ws, calls) = workstation(None);
        let session = ws.generate(EXAMPLE, 2.0).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 4);
        for (call, track) in calls.iter().zip(TrackType::ALL) {
            assert!(call.starts_with(track.isolation_phrase()), "{call}");
        }
        assert!(calls[0].contains("lo-fi") && calls[0].contains("72 BPM"));
        assert!(calls[0].ends_with("no bass no melody no harmony"));

        assert_eq!(session.original_prompt(), EXAMPLE);
        assert!(session.locked_tracks().is_empty());
        assert_eq!(session.track(TrackType::Harmony).samples()[0], 3.0);
        assert_eq!(session.track(TrackType::Melody).provenance().source_description, EXAMPLE);
        assert!((session.duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn duration_is_what_the_engine_produced() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let port = FakePort { calls, fail_on_call: None, yield_ratio: 0.5 };
        let session = Workstation::new(port).generate(EXAMPLE, 8.0).unwrap();
        assert!((session.duration() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn failed_render_yields_no_session() {
        let (ws, calls) = workstation(Some(7));
        let prior = ws.generate(EXAMPLE, 1.0).unwrap();
        let snapshot = prior.clone();

        // Calls 5 and 6 succeed, call 7 (harmony) fails
        let err = ws.generate("dark techno", 1.0).unwrap_err();
        assert!(matches!(err, WorkstationError::Generation { track: TrackType::Harmony, .. }));
        assert_eq!(err.kind(), ErrorKind::GenerationFailure);
        assert_eq!(calls.borrow().len(), 7);
        assert_eq!(prior, snapshot);
    }

    #[test]
    fn empty_buffer_counts_as_generation_failure() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let port = FakePort { calls, fail_on_call: None, yield_ratio: 0.0 };
        let err = Workstation::new(port).generate(EXAMPLE, 1.0).unwrap_err();
        assert!(matches!(
            err,
            WorkstationError::Generation { track: TrackType::Drums, source: GenerateError::EmptyBuffer }
        ));
    }

    #[test]
    fn lock_bass_regenerate_drums() {
        let (ws, calls) = workstation(None);
        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        session.lock(TrackType::Bass);
        let bass_before = session.track(TrackType::Bass).clone();
        let others_before: Vec<AudioTrack> = [TrackType::Harmony, TrackType::Melody]
            .iter()
            .map(|t| session.track(*t).clone())
            .collect();

        let drums = ws
            .regenerate(&mut session, TrackType::Drums, "more organic feel, live drum samples")
            .unwrap();
        assert_eq!(drums.provenance().source_description, "more organic feel, live drum samples");
        assert_eq!(drums.samples()[0], 5.0);

        assert!(session.is_locked(TrackType::Bass));
        assert!(session.track(TrackType::Bass).shares_buffer(&bass_before));
        assert!(session.track(TrackType::Harmony).shares_buffer(&others_before[0]));
        assert!(session.track(TrackType::Melody).shares_buffer(&others_before[1]));
        assert!(!session.is_locked(TrackType::Drums));

        let calls = calls.borrow();
        let prompt = calls.last().unwrap();
        assert!(prompt.starts_with("drums only, lo-fi"));
        assert!(prompt.contains("72 BPM"));
        assert!(prompt.contains("more organic feel, live drum samples"));
        assert!(prompt.contains("matching tempo and key"));
        assert!(prompt.ends_with("no bass no melody no harmony"));
    }

    #[test]
    fn stated_key_reaches_every_engine_call() {
        let (ws, calls) = workstation(None);
        let mut session = ws.generate("dark techno in A minor at 120 bpm", 1.0).unwrap();
        for call in calls.borrow().iter() {
            assert_eq!(classifier::analyze(call).key.as_deref(), Some("A_minor"), "{call}");
        }

        session.lock(TrackType::Harmony);
        ws.regenerate(&mut session, TrackType::Melody, "brighter lead in D minor").unwrap();
        let calls = calls.borrow();
        let regen = classifier::analyze(calls.last().unwrap());
        assert_eq!(regen.key.as_deref(), Some("A_minor"));
        assert_eq!(regen.tempo, Some(120));
    }

    #[test]
    fn regenerating_a_locked_track_is_refused() {
        let (ws, calls) = workstation(None);
        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        session.lock(TrackType::Bass);
        let before = session.clone();

        let err = ws.regenerate(&mut session, TrackType::Bass, "heavier").unwrap_err();
        assert!(matches!(err, WorkstationError::Session(SessionError::Locked(TrackType::Bass))));
        assert_eq!(err.kind(), ErrorKind::LockedTrackViolation);
        assert_eq!(calls.borrow().len(), 4);
        assert_eq!(session, before);
    }

    #[test]
    fn unlock_then_regenerate_succeeds() {
        let (ws, _) = workstation(None);
        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        session.lock(TrackType::Bass);
        session.unlock(TrackType::Bass);
        let bass = ws.regenerate(&mut session, TrackType::Bass, "heavier").unwrap();
        assert_eq!(bass.provenance().source_description, "heavier");
        // Nothing locked now, so no matching clause
        assert!(!bass.provenance().prompt_used.contains("matching tempo and key"));
    }

    #[test]
    fn failed_regeneration_leaves_session_untouched() {
        let (ws, _) = workstation(Some(5));
        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        let before = session.clone();
        let err = ws.regenerate(&mut session, TrackType::Melody, "brighter").unwrap_err();
        assert!(matches!(err, WorkstationError::Generation { track: TrackType::Melody, .. }));
        assert_eq!(session, before);
    }

    #[test]
    fn empty_description_uses_default() {
        let (ws, _) = workstation(None);
        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        let harmony = ws.regenerate(&mut session, TrackType::Harmony, "").unwrap();
        assert_eq!(harmony.provenance().source_description, "different harmony pattern");
    }

    #[test]
    fn named_regeneration_checks_in_order() {
        let (ws, calls) = workstation(None);
        let err = ws.regenerate_named(None, "vocals", "x").unwrap_err();
        assert!(matches!(err, WorkstationError::NoActiveSession));
        assert_eq!(err.kind(), ErrorKind::NoActiveSession);

        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        session.lock(TrackType::Drums);
        let err = ws.regenerate_named(Some(&mut session), "chords", "x").unwrap_err();
        assert!(matches!(err, WorkstationError::Session(SessionError::UnknownTrack(_))));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = ws.regenerate_named(Some(&mut session), "drums", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockedTrackViolation);

        let melody = ws.regenerate_named(Some(&mut session), "Melody", "x").unwrap();
        assert_eq!(melody.track_type(), TrackType::Melody);
        assert_eq!(calls.borrow().len(), 5);
    }

    #[test]
    fn regeneration_sequence_never_touches_locked_tracks() {
        let (ws, _) = workstation(None);
        let mut session = ws.generate(EXAMPLE, 1.0).unwrap();
        session.lock(TrackType::Harmony);
        let harmony = session.track(TrackType::Harmony).clone();

        for (i, track) in TrackType::ALL.into_iter().cycle().take(12).enumerate() {
            let result = ws.regenerate(&mut session, track, &format!("take {i}"));
            assert_eq!(result.is_err(), track == TrackType::Harmony);
            assert!(session.track(TrackType::Harmony).shares_buffer(&harmony));
        }
    }
}
