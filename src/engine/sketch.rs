use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{GenerateError, GeneratedAudio, GenerationPort};
use crate::classifier;
use crate::config::EngineConfig;
use crate::track::TrackType;

const DEFAULT_BPM: u32 = 100;
const BEATS_PER_BAR: usize = 4;

// Scale degrees in semitones above the root
const MAJOR_TRIADS: [[i32; 3]; 4] = [[0, 4, 7], [9, 12, 16], [5, 9, 12], [7, 11, 14]]; // I vi IV V
const MINOR_TRIADS: [[i32; 3]; 4] = [[0, 3, 7], [8, 12, 15], [3, 7, 10], [10, 14, 17]]; // i VI III VII
const MAJOR_PENTATONIC: [i32; 5] = [0, 2, 4, 7, 9];
const MINOR_PENTATONIC: [i32; 5] = [0, 3, 5, 7, 10];

/// Procedural stand-in for a generative model.
///
/// Reads the target track from the prompt's isolation phrase and the tempo
/// and key through the classifier, then renders a simple loop for that
/// track. Good enough to audition the lock/regenerate workflow end to end.
pub struct SketchEngine {
    sample_rate: u32,
    max_duration_secs: f64,
    rng: StdRng,
}

impl SketchEngine {
    pub fn new(sample_rate: u32, max_duration_secs: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { sample_rate, max_duration_secs, rng }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.sample_rate, config.max_duration_secs, config.seed)
    }
}

impl GenerationPort for SketchEngine {
    fn generate(&mut self, prompt: &str, duration_secs: f64) -> Result<GeneratedAudio, GenerateError> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(GenerateError::InvalidDuration(duration_secs));
        }
        if self.sample_rate == 0 {
            return Err(GenerateError::InvalidSampleRate(0));
        }
        let track = TrackType::from_prompt(prompt).ok_or_else(|| {
            GenerateError::Backend("prompt does not name a track to render".to_string())
        })?;

        let duration = duration_secs.min(self.max_duration_secs);
        if duration < duration_secs {
            log::debug!("Capping {track} render at {duration}s (requested {duration_secs}s)");
        }
        let len = ((duration * self.sample_rate as f64).round() as usize).max(1);

        let context = classifier::analyze(prompt);
        let bpm = context.tempo.unwrap_or(DEFAULT_BPM).clamp(40, 240);
        let (root, minor) = parse_key(context.key.as_deref());
        let level = 0.5 + 0.5 * context.energy_level;

        let mut render = Render {
            buf: vec![0.0; len],
            sample_rate: self.sample_rate as f32,
            beat_len: ((60.0 / bpm as f64) * self.sample_rate as f64) as usize,
        };
        match track {
            TrackType::Drums => render.drums(level, &mut self.rng),
            TrackType::Bass => render.bass(root, level, &mut self.rng),
            TrackType::Harmony => render.harmony(root, minor, level),
            TrackType::Melody => render.melody(root, minor, level, &mut self.rng),
        }

        Ok(GeneratedAudio {
            samples: render.finish(),
            sample_rate: self.sample_rate,
        })
    }

    fn name(&self) -> &str {
        "sketch"
    }
}

/// "A_minor" → (9, true), "Dm" → (2, true), None → (0, false)
fn parse_key(key: Option<&str>) -> (i32, bool) {
    let Some(key) = key else {
        return (0, false);
    };
    let mut chars = key.chars();
    let base: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => 0,
    };
    let rest: String = chars.collect();
    let accidental = match rest.chars().next() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    let minor = rest.ends_with("minor") || (rest.ends_with('m') && !rest.ends_with("major"));
    ((base + accidental).rem_euclid(12), minor)
}

fn midi_to_hz(note: i32) -> f32 {
    440.0 * 2f32.powf((note - 69) as f32 / 12.0)
}

struct Render {
    buf: Vec<f32>,
    sample_rate: f32,
    beat_len: usize,
}

impl Render {
    fn beats(&self) -> usize {
        if self.beat_len == 0 { 0 } else { self.buf.len().div_ceil(self.beat_len) }
    }

    /// Decaying sine starting at `start`.
    fn tone(&mut self, start: usize, len: usize, hz: f32, amp: f32, decay_secs: f32) {
        let end = (start + len).min(self.buf.len());
        for i in start..end {
            let t = (i - start) as f32 / self.sample_rate;
            self.buf[i] += amp * (TAU * hz * t).sin() * (-t / decay_secs).exp();
        }
    }

    fn noise(&mut self, start: usize, len: usize, amp: f32, decay_secs: f32, rng: &mut StdRng) {
        let end = (start + len).min(self.buf.len());
        for i in start..end {
            let t = (i - start) as f32 / self.sample_rate;
            self.buf[i] += amp * rng.gen_range(-1.0..1.0f32) * (-t / decay_secs).exp();
        }
    }

    fn drums(&mut self, level: f32, rng: &mut StdRng) {
        let half = self.beat_len / 2;
        for beat in 0..self.beats() {
            let start = beat * self.beat_len;
            self.tone(start, self.beat_len, 55.0, 0.8 * level, 0.12);
            if beat % 2 == 1 {
                self.noise(start, self.beat_len, 0.4 * level, 0.08, rng);
            }
            self.noise(start + half, half, 0.15 * level, 0.02, rng);
        }
    }

    fn bass(&mut self, root: i32, level: f32, rng: &mut StdRng) {
        for beat in 0..self.beats() {
            // Mostly root, sometimes the fifth
            let interval = if rng.gen_bool(0.25) { 7 } else { 0 };
            let hz = midi_to_hz(36 + root + interval);
            self.tone(beat * self.beat_len, self.beat_len, hz, 0.6 * level, 0.35);
        }
    }

    fn harmony(&mut self, root: i32, minor: bool, level: f32) {
        let triads = if minor { MINOR_TRIADS } else { MAJOR_TRIADS };
        let bar_len = self.beat_len * BEATS_PER_BAR;
        if bar_len == 0 {
            return;
        }
        for (bar, start) in (0..self.buf.len()).step_by(bar_len).enumerate() {
            for interval in triads[bar % triads.len()] {
                self.tone(start, bar_len, midi_to_hz(60 + root + interval), 0.2 * level, 2.0);
            }
        }
    }

    fn melody(&mut self, root: i32, minor: bool, level: f32, rng: &mut StdRng) {
        let scale = if minor { MINOR_PENTATONIC } else { MAJOR_PENTATONIC };
        let step = (self.beat_len / 2).max(1);
        for start in (0..self.buf.len()).step_by(step) {
            // Rests, but never on the downbeat
            if start > 0 && rng.gen_bool(0.3) {
                continue;
            }
            let degree = scale[rng.gen_range(0..scale.len())];
            self.tone(start, step, midi_to_hz(72 + root + degree), 0.35 * level, 0.25);
        }
    }

    /// Normalize to a peak of 0.9 (silence stays silence).
    fn finish(mut self) -> Vec<f32> {
        let peak = self.buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak > 0.9 {
            let gain = 0.9 / peak;
            self.buf.iter_mut().for_each(|s| *s *= gain);
        }
        self.buf
    }
}
