use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stemlock::db::{Database, DbError};
use stemlock::db::models::SessionSummary;
use stemlock::engine::SketchEngine;
use stemlock::error::ErrorKind;
use stemlock::export::{ExportError, ExportReport};
use stemlock::session::{SessionError, TrackSession};
use stemlock::workstation::WorkstationError;
use stemlock::{TrackType, Workstation, classifier, composer};

#[derive(Parser)]
#[command(name = "stemlock", version, about = "Prompt-driven four-track loop sketcher with per-track locks")]
struct Cli {
    /// Path to the session database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Directory exported stems are written under
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new four-track session from a prompt
    Generate {
        /// Free-text description, e.g. "chill lo-fi at 72 bpm with jazzy chords"
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Requested length in seconds (defaults to config default_duration)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Session name (defaults to the next session_NN)
        #[arg(long)]
        name: Option<String>,
    },

    /// Lock a track so regeneration leaves it alone
    Lock {
        /// drums, bass, harmony (or chords), melody
        track: String,
    },

    /// Unlock a track
    Unlock {
        /// drums, bass, harmony (or chords), melody
        track: String,
    },

    /// Regenerate one unlocked track of the active session
    Regenerate {
        /// drums, bass, harmony (or chords), melody
        track: String,

        /// How the new version should differ, e.g. "more organic feel"
        description: Vec<String>,
    },

    /// Write stems (and the mix) of a session to the output directory
    Export {
        /// Session name (defaults to the active session)
        name: Option<String>,

        /// Skip mixed.wav
        #[arg(long)]
        no_mix: bool,
    },

    /// Show the active session's tracks and locks
    Status,

    /// List saved sessions
    Sessions,

    /// Show how a prompt is classified and composed, without generating
    Analyze {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
}

/// Core errors carry a coarse kind; the command line turns it into a hint.
trait Kinded {
    fn error_kind(&self) -> ErrorKind;
}

impl Kinded for WorkstationError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

impl Kinded for SessionError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

impl Kinded for DbError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

impl Kinded for ExportError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

trait Hinted<T> {
    fn hinted(self) -> Result<T>;
}

impl<T, E> Hinted<T> for std::result::Result<T, E>
where
    E: Kinded + std::error::Error + Send + Sync + 'static,
{
    fn hinted(self) -> Result<T> {
        self.map_err(|e| {
            let hint = e.error_kind().hint();
            anyhow::Error::new(e).context(hint)
        })
    }
}

/// "chords" is accepted as a synonym for harmony on the command line only.
fn resolve_track_name(name: &str) -> &str {
    if name.trim().eq_ignore_ascii_case("chords") {
        "harmony"
    } else {
        name
    }
}

fn parse_track(name: &str) -> Result<TrackType> {
    resolve_track_name(name).parse::<TrackType>().hinted()
}

/// Lock or unlock a track of the active session and save it. The session is
/// looked up before the track name is checked.
fn set_locked(db: &Database, track_name: &str, locked: bool) -> Result<(String, TrackSession, TrackType)> {
    let (name, mut session) = db.latest_session().hinted()?;
    let track = parse_track(track_name)?;
    if locked {
        session.lock(track);
    } else {
        session.unlock(track);
    }
    db.save_session(&name, &session).hinted()?;
    Ok((name, session, track))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = stemlock::config::AppConfig::load();

    // Resolve paths: CLI > config > default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(stemlock::config::default_db_path);
    let output_dir = cli.output_dir.unwrap_or_else(|| config.output_dir.clone());
    log::info!("Database: {}", db_path.display());

    let db = Database::open(&db_path)
        .context("Failed to open session database")?;
    let workstation = || Workstation::new(SketchEngine::from_config(&config.engine));

    match cli.command {
        Commands::Generate { prompt, duration, name } => {
            let prompt = prompt.join(" ");
            let duration = duration.unwrap_or(config.default_duration);
            let name = match name {
                Some(n) => n,
                None => db.next_session_name().hinted()?,
            };

            let session = workstation().generate(&prompt, duration).hinted()?;
            db.save_session(&name, &session).hinted()?;
            let report = stemlock::export::export_session(&session, &output_dir, &name, config.export.mix)
                .hinted()?;

            println!("Generated session {name}");
            println!();
            print_status(&name, &session);
            println!();
            print_export(&report);
        }

        Commands::Lock { track } => {
            let (name, session, track) = set_locked(&db, &track, true)?;
            println!("Locked {track} in {name} ({}/4 locked)", session.locked_tracks().len());
        }

        Commands::Unlock { track } => {
            let (name, session, track) = set_locked(&db, &track, false)?;
            println!("Unlocked {track} in {name} ({}/4 locked)", session.locked_tracks().len());
        }

        Commands::Regenerate { track, description } => {
            let description = description.join(" ");
            let mut current = db.current_session().hinted()?;

            {
                let ws = workstation();
                let new_track = ws
                    .regenerate_named(
                        current.as_mut().map(|(_, s)| s),
                        resolve_track_name(&track),
                        &description,
                    )
                    .hinted()?;
                println!(
                    "Regenerated {} ({:.1}s): {}",
                    new_track.track_type(),
                    new_track.duration(),
                    new_track.provenance().source_description
                );
            }

            if let Some((name, session)) = &current {
                db.save_session(name, session).hinted()?;
                let report = stemlock::export::export_session(session, &output_dir, name, config.export.mix)
                    .hinted()?;
                println!();
                print_status(name, session);
                println!();
                print_export(&report);
            }
        }

        Commands::Export { name, no_mix } => {
            let (name, session) = match name {
                Some(n) => {
                    let session = db.load_session(&n).hinted()?;
                    (n, session)
                }
                None => db.latest_session().hinted()?,
            };
            let report = stemlock::export::export_session(
                &session, &output_dir, &name, config.export.mix && !no_mix,
            )
            .hinted()?;
            print_export(&report);
        }

        Commands::Status => {
            let (name, session) = db.latest_session().hinted()?;
            print_status(&name, &session);
        }

        Commands::Sessions => {
            let sessions = db.list_sessions().hinted()?;
            if sessions.is_empty() {
                println!("No sessions yet. Run `stemlock generate <prompt>` first.");
                return Ok(());
            }
            print_sessions(&sessions);
        }

        Commands::Analyze { prompt } => {
            let prompt = prompt.join(" ");
            let context = classifier::analyze(&prompt);
            println!("Genre:          {}", context.genre);
            println!(
                "Moods:          {}",
                context.moods.iter().map(|m| m.label()).collect::<Vec<_>>().join(", ")
            );
            println!(
                "Tempo:          {}",
                context.tempo.map(|t| format!("{t} BPM")).unwrap_or_else(|| "-".to_string())
            );
            println!("Key:            {}", context.key.as_deref().unwrap_or("-"));
            println!("Time signature: {}", context.time_signature);
            println!("Energy:         {:.2}", context.energy_level);
            println!("Style tags:     {}", context.style_tags.join(", "));
            println!();

            println!("Instrument hints:");
            for (track, hints) in context.instrument_hints.iter() {
                if !hints.is_empty() {
                    println!("  {:<8} {}", track.name(), hints.join(", "));
                }
            }
            println!();

            println!("Prompts:");
            for (track, p) in composer::compose(&context).iter() {
                println!("  {:<8} {}", track.name(), p);
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Print the track table of a session.
fn print_status(name: &str, session: &TrackSession) {
    let status = session.status();
    println!("Session: {name}");
    println!("Prompt:  \"{}\"", status.original_prompt);
    println!("Length:  {:.1}s, {}/4 locked", status.duration, status.locked_count);
    println!();

    println!("{:<8} {:<6} {:>6}  {}", "Track", "Lock", "Secs", "Source");
    println!("{}", "-".repeat(72));
    for t in &status.tracks {
        println!(
            "{:<8} {:<6} {:>6.1}  {}",
            t.track_type.name(),
            if t.locked { "locked" } else { "" },
            t.duration,
            truncate(&t.source_description, 48),
        );
    }
}

fn print_export(report: &ExportReport) {
    println!("Exported to {}:", report.dir.display());
    for path in report.stems.iter().chain(report.mix.iter()) {
        if let Some(file) = path.file_name() {
            println!("  {}", file.to_string_lossy());
        }
    }
}

/// Print a table of saved sessions, active one marked.
fn print_sessions(sessions: &[SessionSummary]) {
    println!(
        "{:<2}{:<16} {:>6} {:<20} {:<19}  {}",
        "", "Name", "Secs", "Locked", "Updated", "Prompt"
    );
    println!("{}", "-".repeat(100));

    for s in sessions {
        let locked = if s.locked_tracks.is_empty() {
            "-".to_string()
        } else {
            s.locked_tracks.iter().map(|t| t.name()).collect::<Vec<_>>().join(",")
        };
        println!(
            "{:<2}{:<16} {:>6.1} {:<20} {:<19}  {}",
            if s.active { "*" } else { "" },
            truncate(&s.name, 16),
            s.duration,
            locked,
            s.updated_at,
            truncate(&s.prompt, 34),
        );
    }

    println!();
    println!("* = active session");
}
