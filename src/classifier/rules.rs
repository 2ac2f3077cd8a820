/// One row of a keyword table: a label and the substrings that select it.
#[derive(Debug, Clone, Copy)]
pub struct Rule<L: 'static> {
    pub label: L,
    pub patterns: &'static [&'static str],
}

impl<L: Copy> Rule<L> {
    pub const fn new(label: L, patterns: &'static [&'static str]) -> Self {
        Self { label, patterns }
    }

    /// Does any pattern occur in `text`? `text` must already be lowercase.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| text.contains(p))
    }

    /// Patterns that occur in `text`, in table order.
    pub fn matched_patterns(&self, text: &str) -> Vec<&'static str> {
        self.patterns
            .iter()
            .copied()
            .filter(|p| text.contains(p))
            .collect()
    }
}

/// Single-valued categories: the first rule in table order wins,
/// regardless of where in the text its pattern appears.
pub fn first_match<L: Copy>(rules: &[Rule<L>], text: &str) -> Option<L> {
    rules.iter().find(|r| r.matches(text)).map(|r| r.label)
}

/// Multi-valued categories: every matching rule, in table order.
pub fn all_matches<L: Copy>(rules: &[Rule<L>], text: &str) -> Vec<L> {
    rules
        .iter()
        .filter(|r| r.matches(text))
        .map(|r| r.label)
        .collect()
}

/// Words from `words` that occur in `text`, ordered by first occurrence.
/// Ties (one word containing another at the same offset) keep table order.
pub fn by_first_occurrence(words: &[&'static str], text: &str) -> Vec<&'static str> {
    let mut found: Vec<(usize, usize, &'static str)> = words
        .iter()
        .enumerate()
        .filter_map(|(i, w)| text.find(w).map(|pos| (pos, i, *w)))
        .collect();
    found.sort_unstable();
    found.into_iter().map(|(_, _, w)| w).collect()
}
