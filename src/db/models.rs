use crate::track::TrackType;

/// A session row, without its audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub name: String,
    pub prompt: String,
    pub locked_tracks: Vec<TrackType>,
    pub duration: f64,
    pub created_at: String,
    pub updated_at: String,
    /// True for the session `latest_session` would return.
    pub active: bool,
}
