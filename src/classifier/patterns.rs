use regex::Regex;
use std::sync::LazyLock;

// Tempo patterns, tried in order; first numeric capture wins.
// e.g., "120 BPM", "72 beats per minute", "at 90", "85 beat"
static TEMPO_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\d+)\s*bpm",
        r"(?i)(\d+)\s*beats per minute",
        r"(?i)\bat\s+(\d+)",
        r"(?i)(\d+)\s*(?:beat|tempo)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// Key with explicit mode: "in C minor", "Bb major"
static KEY_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bin\s+(?P<root>[a-g][#b]?)\s+(?P<mode>major|minor)\b").unwrap()
});

static KEY_MODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<root>[a-g][#b]?)\s+(?P<mode>major|minor)\b").unwrap()
});

// Shorthand minor key: "Dm", "F#m". Case-sensitive so "am" and "em" stay words.
static KEY_SHORTHAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9#])(?P<key>[A-G][#b]?m)(?:$|[^A-Za-z0-9#])").unwrap()
});

// Explicit meter: "3/4", "6/8 time"
static TIME_SIG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<num>\d{1,2})/(?P<den>\d{1,2})\b").unwrap()
});

/// First tempo found by the ordered tempo patterns. No unit conversion.
pub fn extract_tempo(text: &str) -> Option<u32> {
    TEMPO_RES.iter().find_map(|re| {
        re.captures_iter(text)
            .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
    })
}

/// Key as `"Root_mode"` (e.g. `"A_minor"`) or bare shorthand (`"Dm"`).
pub fn extract_key(text: &str) -> Option<String> {
    for re in [&*KEY_IN_RE, &*KEY_MODE_RE] {
        if let Some(caps) = re.captures(text) {
            let root = normalize_root(&caps["root"]);
            let mode = caps["mode"].to_lowercase();
            return Some(format!("{root}_{mode}"));
        }
    }
    KEY_SHORTHAND_RE
        .captures(text)
        .map(|caps| caps["key"].to_string())
}

/// Explicit time signature, if the text states a plausible one.
pub fn extract_time_signature(text: &str) -> Option<String> {
    TIME_SIG_RE.captures_iter(text).find_map(|caps| {
        let num: u32 = caps["num"].parse().ok()?;
        let den: u32 = caps["den"].parse().ok()?;
        let plausible = (1..=16).contains(&num) && matches!(den, 2 | 4 | 8 | 16);
        plausible.then(|| format!("{num}/{den}"))
    })
}

/// "bb" → "Bb", "f#" → "F#"
fn normalize_root(root: &str) -> String {
    let mut chars = root.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
