use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::session::SessionError;

/// One instrumental layer of an arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Drums,
    Bass,
    Harmony,
    Melody,
}

impl TrackType {
    /// Canonical order: generation order, export order, status order.
    pub const ALL: [TrackType; 4] = [
        TrackType::Drums,
        TrackType::Bass,
        TrackType::Harmony,
        TrackType::Melody,
    ];

    /// Order in which negations are written into a prompt
    /// ("drums only, ..., no bass no melody no harmony").
    const EXCLUSION_ORDER: [TrackType; 4] = [
        TrackType::Drums,
        TrackType::Bass,
        TrackType::Melody,
        TrackType::Harmony,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Harmony => "harmony",
            Self::Melody => "melody",
        }
    }

    /// The phrase that asserts this track in isolation.
    pub fn isolation_phrase(self) -> &'static str {
        match self {
            Self::Drums => "drums only",
            Self::Bass => "bass line only",
            Self::Harmony => "chord progression only",
            Self::Melody => "melody only",
        }
    }

    /// Every other track type, in exclusion order.
    pub fn others(self) -> impl Iterator<Item = TrackType> {
        Self::EXCLUSION_ORDER.into_iter().filter(move |t| *t != self)
    }

    /// "no bass no melody no harmony" for drums, and so on.
    pub fn exclusion_clause(self) -> String {
        self.others()
            .map(|t| format!("no {}", t.name()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Recover the target track from a composed prompt by its isolation phrase.
    pub fn from_prompt(prompt: &str) -> Option<TrackType> {
        let lower = prompt.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| lower.starts_with(t.isolation_phrase()))
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackType {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| SessionError::UnknownTrack(s.to_string()))
    }
}

/// A fixed record with one slot per track type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackMap<T> {
    pub drums: T,
    pub bass: T,
    pub harmony: T,
    pub melody: T,
}

impl<T> TrackMap<T> {
    pub fn from_fn(mut f: impl FnMut(TrackType) -> T) -> Self {
        Self {
            drums: f(TrackType::Drums),
            bass: f(TrackType::Bass),
            harmony: f(TrackType::Harmony),
            melody: f(TrackType::Melody),
        }
    }

    /// Build every slot in canonical order, stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(TrackType) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            drums: f(TrackType::Drums)?,
            bass: f(TrackType::Bass)?,
            harmony: f(TrackType::Harmony)?,
            melody: f(TrackType::Melody)?,
        })
    }

    pub fn get(&self, track: TrackType) -> &T {
        match track {
            TrackType::Drums => &self.drums,
            TrackType::Bass => &self.bass,
            TrackType::Harmony => &self.harmony,
            TrackType::Melody => &self.melody,
        }
    }

    pub fn get_mut(&mut self, track: TrackType) -> &mut T {
        match track {
            TrackType::Drums => &mut self.drums,
            TrackType::Bass => &mut self.bass,
            TrackType::Harmony => &mut self.harmony,
            TrackType::Melody => &mut self.melody,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackType, &T)> {
        TrackType::ALL.into_iter().map(move |t| (t, self.get(t)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(TrackType, &T) -> U) -> TrackMap<U> {
        TrackMap::from_fn(|t| f(t, self.get(t)))
    }

    /// Consume the map, converting every slot in canonical order and
    /// stopping at the first error.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(TrackType, T) -> Result<U, E>,
    ) -> Result<TrackMap<U>, E> {
        Ok(TrackMap {
            drums: f(TrackType::Drums, self.drums)?,
            bass: f(TrackType::Bass, self.bass)?,
            harmony: f(TrackType::Harmony, self.harmony)?,
            melody: f(TrackType::Melody, self.melody)?,
        })
    }
}
