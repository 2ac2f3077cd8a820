pub mod classifier;
pub mod composer;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod session;
pub mod track;
pub mod workstation;

pub use error::ErrorKind;
pub use session::TrackSession;
pub use track::{TrackMap, TrackType};
pub use workstation::Workstation;

/// Application name for XDG paths
pub const APP_NAME: &str = "stemlock";
