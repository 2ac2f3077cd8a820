//! Context + lock state → per-track generation prompts.
//!
//! Each stem is generated by an independent engine call with no shared
//! latent state, so prompt text is the only thing holding the stems
//! together. Every prompt therefore names its own track in isolation,
//! repeats the same base style clause, and negates the other three tracks.

use crate::classifier::{Genre, MusicContext};
use crate::session::LockedContext;
use crate::track::{TrackMap, TrackType};

/// At most this many style tags go into the base style clause.
pub const MAX_STYLE_TAGS: usize = 2;

pub const LOCKED_CONSTRAINT: &str = "matching tempo and key";

/// Genre-specific phrasing for one track type.
struct StylePhrase {
    genre: Genre,
    track: TrackType,
    phrase: &'static str,
}

const STYLE_TABLE: &[StylePhrase] = &[
    StylePhrase { genre: Genre::LoFi, track: TrackType::Drums, phrase: "laid back swing, vintage drum samples" },
    StylePhrase { genre: Genre::LoFi, track: TrackType::Bass, phrase: "warm analog bass, smooth low end" },
    StylePhrase { genre: Genre::LoFi, track: TrackType::Harmony, phrase: "jazzy chords, warm keys, vintage electric piano" },
    StylePhrase { genre: Genre::LoFi, track: TrackType::Melody, phrase: "subtle melody, atmospheric lead, vinyl texture" },
    StylePhrase { genre: Genre::Techno, track: TrackType::Drums, phrase: "four on the floor kick, electronic percussion" },
    StylePhrase { genre: Genre::Techno, track: TrackType::Bass, phrase: "driving electronic bass, sub frequencies" },
    StylePhrase { genre: Genre::Techno, track: TrackType::Harmony, phrase: "atmospheric pads, electronic textures" },
    StylePhrase { genre: Genre::Techno, track: TrackType::Melody, phrase: "electronic lead, synthesizer melody" },
    StylePhrase { genre: Genre::HipHop, track: TrackType::Drums, phrase: "boom bap pattern, punchy snare" },
    StylePhrase { genre: Genre::HipHop, track: TrackType::Bass, phrase: "deep 808 bass, punchy low end" },
    StylePhrase { genre: Genre::Jazz, track: TrackType::Harmony, phrase: "complex jazz chords, piano comping" },
    StylePhrase { genre: Genre::Jazz, track: TrackType::Melody, phrase: "improvised solo, melodic phrases" },
    StylePhrase { genre: Genre::Ambient, track: TrackType::Harmony, phrase: "slow evolving pads, long reverb tails" },
    StylePhrase { genre: Genre::Ambient, track: TrackType::Melody, phrase: "sparse drifting tones" },
    StylePhrase { genre: Genre::Funk, track: TrackType::Drums, phrase: "tight syncopated groove, ghost notes" },
    StylePhrase { genre: Genre::Funk, track: TrackType::Bass, phrase: "slap bass, syncopated sixteenth notes" },
];

/// Generic phrase when the genre has no specific entry for a track.
fn generic_phrase(track: TrackType) -> &'static str {
    match track {
        TrackType::Drums => "rhythmic pattern",
        TrackType::Bass => "bass line",
        TrackType::Harmony => "chord progression",
        TrackType::Melody => "melodic line",
    }
}

/// Richer style phrase for `track` in `genre`, or the generic fallback.
pub fn style_phrase(genre: Genre, track: TrackType) -> &'static str {
    STYLE_TABLE
        .iter()
        .find(|s| s.genre == genre && s.track == track)
        .map(|s| s.phrase)
        .unwrap_or_else(|| generic_phrase(track))
}

/// "A_minor" → "in A minor", "F#m" → "in F# minor".
///
/// Always the spelled-out form, so a reader of the prompt finds this key
/// before any shorthand a user description might add.
pub fn key_phrase(key: &str) -> String {
    if let Some((root, mode)) = key.split_once('_') {
        format!("in {root} {mode}")
    } else if let Some(root) = key.strip_suffix('m') {
        format!("in {root} minor")
    } else {
        format!("in {key}")
    }
}

/// "lo-fi, chill, 72 BPM, in A minor, warm, analog"
pub fn base_style(context: &MusicContext) -> String {
    let mut parts: Vec<String> = vec![context.genre.label().to_string()];
    parts.extend(context.moods.iter().map(|m| m.label().to_string()));
    if let Some(bpm) = context.tempo {
        parts.push(format!("{bpm} BPM"));
    }
    if let Some(key) = &context.key {
        parts.push(key_phrase(key));
    }
    parts.extend(context.style_tags.iter().take(MAX_STYLE_TAGS).cloned());
    parts.join(", ")
}

/// Prompt for one track of an initial generation.
pub fn compose_track(context: &MusicContext, track: TrackType) -> String {
    format!(
        "{}, {}, {}, {}",
        track.isolation_phrase(),
        style_phrase(context.genre, track),
        base_style(context),
        track.exclusion_clause()
    )
}

/// Prompts for all four tracks of an initial generation.
pub fn compose(context: &MusicContext) -> TrackMap<String> {
    TrackMap::from_fn(|track| compose_track(context, track))
}

/// Prompt for regenerating one track.
///
/// The base style comes from `original` (the context recorded when the
/// session was created), not from reclassifying `description`, so the new
/// stem stays anchored to the original request. It is written before the
/// description so the original tempo and key are the first ones a reader of
/// the prompt finds. Any locked track adds the tempo/key matching constraint.
pub fn compose_regeneration(
    track: TrackType,
    description: &str,
    locked: &LockedContext,
    original: &MusicContext,
) -> String {
    let mut parts = vec![track.isolation_phrase().to_string(), base_style(original)];
    let description = description.trim();
    if !description.is_empty() {
        parts.push(description.to_string());
    }
    if !locked.is_empty() {
        parts.push(LOCKED_CONSTRAINT.to_string());
    }
    parts.push(track.exclusion_clause());
    parts.join(", ")
}

/// Description used when the user asks to regenerate without saying how.
pub fn default_regeneration_description(track: TrackType) -> String {
    format!("different {} pattern", track.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::analyze;
    use crate::session::LockedTrackSummary;
    use crate::session::Provenance;

    const EXAMPLE: &str =
        "chill lo-fi hip-hop beat at 72 BPM with jazzy chords and warm analog bass";

    const ALL_GENRES: [Genre; 11] = [
        Genre::LoFi, Genre::HipHop, Genre::Techno, Genre::Jazz, Genre::Ambient,
        Genre::Rock, Genre::Pop, Genre::Classical, Genre::Reggae, Genre::Funk,
        Genre::Electronic,
    ];

    fn locked_bass() -> LockedContext {
        LockedContext {
            tracks: vec![LockedTrackSummary {
                track_type: TrackType::Bass,
                provenance: Provenance::new("bass line only, ...", "warm bass"),
                duration: 8.0,
                sample_rate: 32000,
                rms_energy: 0.2,
            }],
        }
    }

    #[test]
    fn example_drums_prompt() {
        let prompts = compose(&analyze(EXAMPLE));
        let drums = &prompts.drums;
        assert!(drums.starts_with("drums only"));
        assert!(drums.contains("lo-fi"));
        assert!(drums.contains("72 BPM"));
        assert!(drums.ends_with("no bass no melody no harmony"));
        assert!(drums.contains("laid back swing, vintage drum samples"));
    }

    #[test]
    fn base_style_caps_style_tags() {
        let ctx = analyze("vintage warm punchy smooth funk");
        assert_eq!(base_style(&ctx), "funk, neutral, vintage, warm");
    }

    #[test]
    fn generic_phrase_when_genre_has_no_entry() {
        assert_eq!(style_phrase(Genre::Classical, TrackType::Drums), "rhythmic pattern");
        assert_eq!(style_phrase(Genre::Jazz, TrackType::Bass), "bass line");
        assert_eq!(
            style_phrase(Genre::Jazz, TrackType::Harmony),
            "complex jazz chords, piano comping"
        );
    }

    #[test]
    fn no_other_track_is_asserted_positively() {
        for genre in ALL_GENRES {
            let mut ctx = analyze("");
            ctx.genre = genre;
            let prompts = compose(&ctx);
            for (track, prompt) in prompts.iter() {
                assert!(prompt.starts_with(track.isolation_phrase()), "{prompt}");
                for other in track.others() {
                    assert!(
                        !prompt.contains(other.isolation_phrase()),
                        "{genre} {track} prompt asserts {other}: {prompt}"
                    );
                    assert!(prompt.contains(&format!("no {}", other.name())));
                }
            }
        }
    }

    #[test]
    fn regeneration_without_locks_has_no_constraint() {
        let ctx = analyze(EXAMPLE);
        let prompt = compose_regeneration(
            TrackType::Drums,
            "more organic feel, live drum samples",
            &LockedContext::default(),
            &ctx,
        );
        assert_eq!(
            prompt,
            "drums only, lo-fi, chill, 72 BPM, warm, analog, \
             more organic feel, live drum samples, no bass no melody no harmony"
        );
    }

    #[test]
    fn regeneration_with_locks_matches_tempo_and_key() {
        let ctx = analyze(EXAMPLE);
        let prompt = compose_regeneration(TrackType::Drums, "busier hats", &locked_bass(), &ctx);
        assert!(prompt.contains(LOCKED_CONSTRAINT));
        assert!(prompt.ends_with(&format!("{LOCKED_CONSTRAINT}, no bass no melody no harmony")));
    }

    #[test]
    fn regeneration_keeps_original_style_when_description_drifts() {
        let ctx = analyze(EXAMPLE);
        let prompt = compose_regeneration(
            TrackType::Melody,
            "aggressive techno lead at 140 bpm",
            &LockedContext::default(),
            &ctx,
        );
        assert!(prompt.contains("lo-fi, chill, 72 BPM"));
        assert!(prompt.starts_with("melody only"));
        assert!(prompt.ends_with("no drums no bass no harmony"));
    }

    #[test]
    fn empty_description_is_skipped() {
        let ctx = analyze("");
        let prompt = compose_regeneration(TrackType::Bass, "  ", &LockedContext::default(), &ctx);
        assert_eq!(prompt, "bass line only, electronic, neutral, no drums no melody no harmony");
    }

    #[test]
    fn key_phrase_spells_out_the_mode() {
        assert_eq!(key_phrase("A_minor"), "in A minor");
        assert_eq!(key_phrase("Bb_major"), "in Bb major");
        assert_eq!(key_phrase("F#m"), "in F# minor");
    }

    #[test]
    fn composed_prompts_carry_the_key() {
        let ctx = analyze("dark techno in A minor at 120 bpm");
        for (track, prompt) in compose(&ctx).iter() {
            assert!(prompt.contains("120 BPM, in A minor"), "{prompt}");
            let seen = analyze(prompt);
            assert_eq!(seen.key.as_deref(), Some("A_minor"), "{track}: {prompt}");
            assert_eq!(seen.tempo, Some(120), "{track}: {prompt}");
        }

        // Shorthand keys come back spelled out, same pitch and mode
        let ctx = analyze("moody jam in Dm");
        let prompts = compose(&ctx);
        assert_eq!(analyze(&prompts.bass).key.as_deref(), Some("D_minor"));
    }

    #[test]
    fn regeneration_keeps_original_key_over_description() {
        let ctx = analyze("dark techno in A minor at 120 bpm");
        let prompt = compose_regeneration(
            TrackType::Melody,
            "brighter lead in D minor at 140 bpm",
            &locked_bass(),
            &ctx,
        );
        let seen = analyze(&prompt);
        assert_eq!(seen.key.as_deref(), Some("A_minor"));
        assert_eq!(seen.tempo, Some(120));
        assert!(prompt.contains("brighter lead in D minor"));
    }

    #[test]
    fn default_description_names_the_track() {
        assert_eq!(default_regeneration_description(TrackType::Harmony), "different harmony pattern");
    }
}
