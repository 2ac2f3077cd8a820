use super::models::SessionSummary;
use super::{Database, DbError, Result};
use crate::session::TrackSession;
use crate::session::persist;
use crate::track::TrackType;
use rusqlite::{OptionalExtension, params};

const NAME_PREFIX: &str = "session_";

impl Database {
    /// Insert or replace a named session and make it the active one.
    pub fn save_session(&self, name: &str, session: &TrackSession) -> Result<()> {
        let blob = persist::to_blob(session)?;
        let locked = session
            .locked_tracks()
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(",");

        self.conn.execute(
            "INSERT INTO sessions (
                name, prompt, locked_tracks, duration, blob, touched, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                (SELECT COALESCE(MAX(touched), 0) + 1 FROM sessions),
                datetime('now')
            )
            ON CONFLICT(name) DO UPDATE SET
                prompt = excluded.prompt,
                locked_tracks = excluded.locked_tracks,
                duration = excluded.duration,
                blob = excluded.blob,
                touched = excluded.touched,
                updated_at = datetime('now')
            ",
            params![name, session.original_prompt(), locked, session.duration(), blob],
        )?;
        log::debug!("Saved session '{name}' ({} bytes)", blob.len());
        Ok(())
    }

    /// Load a session by name.
    pub fn load_session(&self, name: &str) -> Result<TrackSession> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT blob FROM sessions WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;

        match blob {
            Some(blob) => Ok(persist::from_blob(&blob)?),
            None => Err(DbError::UnknownSession(name.to_string())),
        }
    }

    /// The most recently saved session, if any.
    pub fn current_session(&self) -> Result<Option<(String, TrackSession)>> {
        let row: Option<(String, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT name, blob FROM sessions ORDER BY touched DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((name, blob)) => Ok(Some((name, persist::from_blob(&blob)?))),
            None => Ok(None),
        }
    }

    /// Like `current_session`, but an empty store is an error.
    pub fn latest_session(&self) -> Result<(String, TrackSession)> {
        self.current_session()?.ok_or(DbError::NoActiveSession)
    }

    /// All sessions, most recently touched first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, prompt, locked_tracks, duration, created_at, updated_at
             FROM sessions ORDER BY touched DESC",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                let locked: String = row.get(2)?;
                Ok(SessionSummary {
                    name: row.get(0)?,
                    prompt: row.get(1)?,
                    locked_tracks: parse_locked(&locked),
                    duration: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                    active: false,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions
            .into_iter()
            .enumerate()
            .map(|(i, s)| SessionSummary { active: i == 0, ..s })
            .collect())
    }

    /// First unused `session_NN` name, one past the highest number in use.
    pub fn next_session_name(&self) -> Result<String> {
        let mut stmt = self.conn.prepare("SELECT name FROM sessions WHERE name LIKE ?1")?;
        let highest = stmt
            .query_map(params![format!("{NAME_PREFIX}%")], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .iter()
            .filter_map(|name| name.strip_prefix(NAME_PREFIX)?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(format!("{NAME_PREFIX}{:02}", highest + 1))
    }
}

fn parse_locked(field: &str) -> Vec<TrackType> {
    field
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}
