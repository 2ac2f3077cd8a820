//! Free text → structured [`MusicContext`].
//!
//! Classification is pure keyword matching over the lowercased prompt; it
//! never looks at audio. Every category is driven by an ordered rule table
//! evaluated by the generic matchers in [`rules`], so the tie-break policy
//! for single-valued categories is simply "first row in the table wins".
//! For example "jazz-influenced lo-fi" classifies as lo-fi because lo-fi is
//! listed before jazz, not because it is more specific.

pub mod patterns;
pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::track::{TrackMap, TrackType};
use rules::Rule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Genre {
    #[serde(rename = "lo-fi")]
    LoFi,
    #[serde(rename = "hip-hop")]
    HipHop,
    #[serde(rename = "techno")]
    Techno,
    #[serde(rename = "jazz")]
    Jazz,
    #[serde(rename = "ambient")]
    Ambient,
    #[serde(rename = "rock")]
    Rock,
    #[serde(rename = "pop")]
    Pop,
    #[serde(rename = "classical")]
    Classical,
    #[serde(rename = "reggae")]
    Reggae,
    #[serde(rename = "funk")]
    Funk,
    /// Fallback when no genre keyword matches.
    #[default]
    #[serde(rename = "electronic")]
    Electronic,
}

impl Genre {
    pub fn label(self) -> &'static str {
        match self {
            Self::LoFi => "lo-fi",
            Self::HipHop => "hip-hop",
            Self::Techno => "techno",
            Self::Jazz => "jazz",
            Self::Ambient => "ambient",
            Self::Rock => "rock",
            Self::Pop => "pop",
            Self::Classical => "classical",
            Self::Reggae => "reggae",
            Self::Funk => "funk",
            Self::Electronic => "electronic",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Chill,
    Dark,
    Uplifting,
    Aggressive,
    Dreamy,
    Energetic,
    /// Placeholder used when no mood keyword matches.
    Neutral,
}

impl Mood {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chill => "chill",
            Self::Dark => "dark",
            Self::Uplifting => "uplifting",
            Self::Aggressive => "aggressive",
            Self::Dreamy => "dreamy",
            Self::Energetic => "energetic",
            Self::Neutral => "neutral",
        }
    }

    pub fn energy(self) -> f32 {
        match self {
            Self::Chill => 0.3,
            Self::Dark => 0.6,
            Self::Uplifting => 0.7,
            Self::Aggressive => 0.9,
            Self::Dreamy => 0.4,
            Self::Energetic => 0.8,
            Self::Neutral => 0.5,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub const GENRE_RULES: &[Rule<Genre>] = &[
    Rule::new(Genre::LoFi, &["lo-fi", "lofi", "low-fi"]),
    Rule::new(Genre::HipHop, &["hip-hop", "hiphop", "hip hop", "rap"]),
    Rule::new(Genre::Techno, &["techno", "electronic", "edm"]),
    Rule::new(Genre::Jazz, &["jazz", "jazzy"]),
    Rule::new(Genre::Ambient, &["ambient", "atmospheric", "ethereal"]),
    Rule::new(Genre::Rock, &["rock", "guitar"]),
    Rule::new(Genre::Pop, &["pop", "catchy"]),
    Rule::new(Genre::Classical, &["classical", "orchestral", "symphony"]),
    Rule::new(Genre::Reggae, &["reggae", "dub"]),
    Rule::new(Genre::Funk, &["funk", "funky", "groove"]),
];

pub const MOOD_RULES: &[Rule<Mood>] = &[
    Rule::new(Mood::Chill, &["chill", "relaxed", "laid back", "calm"]),
    Rule::new(Mood::Dark, &["dark", "moody", "brooding"]),
    Rule::new(Mood::Uplifting, &["uplifting", "happy", "bright", "positive"]),
    Rule::new(Mood::Aggressive, &["aggressive", "intense", "driving", "hard"]),
    Rule::new(Mood::Dreamy, &["dreamy", "floating", "ethereal", "atmospheric"]),
    Rule::new(Mood::Energetic, &["energetic", "high energy", "pumping", "powerful"]),
];

pub const INSTRUMENT_RULES: &[Rule<TrackType>] = &[
    Rule::new(TrackType::Drums, &["drums", "kick", "snare", "hihat", "percussion", "rhythm"]),
    Rule::new(TrackType::Bass, &["bass", "bassline", "sub", "low end", "808"]),
    Rule::new(TrackType::Harmony, &["chords", "harmony", "keys", "piano", "pads", "strings"]),
    Rule::new(TrackType::Melody, &["melody", "lead", "solo", "hook", "riff"]),
];

pub const STYLE_WORDS: &[&str] = &[
    "analog", "digital", "vintage", "modern", "retro",
    "warm", "cold", "punchy", "smooth", "rough",
    "swing", "straight", "triplets", "syncopated",
];

pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";

/// Structured musical intent extracted from a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicContext {
    pub genre: Genre,
    /// Never empty: `[Mood::Neutral]` when nothing matched.
    pub moods: Vec<Mood>,
    pub tempo: Option<u32>,
    pub key: Option<String>,
    pub time_signature: String,
    pub instrument_hints: TrackMap<Vec<String>>,
    /// First-seen order in the prompt.
    pub style_tags: Vec<String>,
    /// 0.0 to 1.0
    pub energy_level: f32,
}

impl Default for MusicContext {
    fn default() -> Self {
        analyze("")
    }
}

/// Classify a prompt. Total: missing signals become defaults, never errors.
pub fn analyze(text: &str) -> MusicContext {
    let lower = text.to_lowercase();

    let genre = rules::first_match(GENRE_RULES, &lower).unwrap_or_default();

    let mut moods = rules::all_matches(MOOD_RULES, &lower);
    if moods.is_empty() {
        moods.push(Mood::Neutral);
    }
    let energy_level = estimate_energy(&moods);

    let instrument_hints: TrackMap<Vec<String>> = TrackMap::from_fn(|track| {
        INSTRUMENT_RULES
            .iter()
            .find(|r| r.label == track)
            .map(|r| r.matched_patterns(&lower).into_iter().map(String::from).collect())
            .unwrap_or_default()
    });

    let style_tags: Vec<String> = rules::by_first_occurrence(STYLE_WORDS, &lower)
        .into_iter()
        .map(String::from)
        .collect();

    let context = MusicContext {
        genre,
        moods,
        tempo: patterns::extract_tempo(text),
        key: patterns::extract_key(text),
        time_signature: patterns::extract_time_signature(text)
            .unwrap_or_else(|| DEFAULT_TIME_SIGNATURE.to_string()),
        instrument_hints,
        style_tags,
        energy_level,
    };
    log::debug!(
        "Classified {:?}: genre={} moods={:?} tempo={:?} key={:?}",
        text, context.genre, context.moods, context.tempo, context.key
    );
    context
}

/// Unweighted mean of the per-mood energy table; 0.5 with nothing to average.
fn estimate_energy(moods: &[Mood]) -> f32 {
    if moods.is_empty() {
        return 0.5;
    }
    moods.iter().map(|m| m.energy()).sum::<f32>() / moods.len() as f32
}
