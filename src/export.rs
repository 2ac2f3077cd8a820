use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::session::{AudioTrack, TrackSession};
use crate::track::TrackType;

pub const MIX_FILE_NAME: &str = "mixed.wav";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot mix {track} at {found} Hz into a {expected} Hz mix")]
    SampleRateMismatch { track: TrackType, expected: u32, found: u32 },
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SampleRateMismatch { .. } => ErrorKind::GenerationFailure,
            Self::Wav(_) | Self::Io(_) => ErrorKind::PersistenceFailure,
        }
    }
}

/// Files written by one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub dir: PathBuf,
    pub stems: Vec<PathBuf>,
    pub mix: Option<PathBuf>,
}

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), ExportError> {
    let mut writer = WavWriter::create(path, spec(sample_rate))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write one `<track>.wav` per track into `dir`, in canonical order.
pub fn export_stems(session: &TrackSession, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;
    session
        .tracks()
        .map(|(t, track)| {
            let path = dir.join(format!("{t}.wav"));
            write_wav(&path, track.samples(), track.sample_rate())?;
            log::debug!("Wrote {} ({:.2}s)", path.display(), track.duration());
            Ok::<_, ExportError>(path)
        })
        .collect()
}

/// Per-sample average of every track; shorter tracks count as silence once
/// they run out.
pub fn mixdown(session: &TrackSession) -> Result<(Vec<f32>, u32), ExportError> {
    let tracks: Vec<(TrackType, &AudioTrack)> = session.tracks().collect();
    let sample_rate = tracks[0].1.sample_rate();
    if let Some((track, other)) = tracks.iter().find(|(_, t)| t.sample_rate() != sample_rate) {
        return Err(ExportError::SampleRateMismatch {
            track: *track,
            expected: sample_rate,
            found: other.sample_rate(),
        });
    }

    let len = tracks.iter().map(|(_, t)| t.samples().len()).max().unwrap_or(0);
    let mut mix = vec![0.0f32; len];
    for (_, track) in &tracks {
        for (m, s) in mix.iter_mut().zip(track.samples()) {
            *m += *s;
        }
    }
    let n = tracks.len() as f32;
    mix.iter_mut().for_each(|m| *m /= n);
    Ok((mix, sample_rate))
}

pub fn export_mix(session: &TrackSession, path: &Path) -> Result<(), ExportError> {
    let (mix, sample_rate) = mixdown(session)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_wav(path, &mix, sample_rate)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// Stems (and optionally the mix) into `<output_dir>/<name>/`.
pub fn export_session(
    session: &TrackSession,
    output_dir: &Path,
    name: &str,
    with_mix: bool,
) -> Result<ExportReport, ExportError> {
    let dir = output_dir.join(name);
    let stems = export_stems(session, &dir)?;
    let mix = if with_mix {
        let path = dir.join(MIX_FILE_NAME);
        export_mix(session, &path)?;
        Some(path)
    } else {
        None
    };
    log::info!("Exported {} stems to {}", stems.len(), dir.display());
    Ok(ExportReport { dir, stems, mix })
}
