// Document store and activity log: the host-side seams the coordinator
// writes through, plus a SQLite-backed implementation.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::schema;

// ---------------------------------------------------------------------------
// Seam types
// ---------------------------------------------------------------------------

/// A draft-eligible character record, as listed by the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    /// Display name used in announcements.
    pub name: String,
    /// Only player-owned records are offered for the draft.
    pub player_owned: bool,
}

/// One field change in a participant record, addressed by dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPatch {
    pub path: String,
    pub value: i64,
}

/// All finalization changes for one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantUpdate {
    pub participant_id: String,
    pub patches: Vec<FieldPatch>,
}

/// Read/write access to the character records the draft operates on.
///
/// The coordinator reads twice (participant list, skill catalog) and writes
/// once, at finalization, as a single batch.
pub trait DocumentStore {
    /// All records eligible for a draft, in a stable order.
    fn list_participants(&self) -> Result<Vec<Participant>>;

    /// Keys of the draftable-skill catalog derived from the character
    /// schema. A failure here degrades the draft to an empty pool; it does
    /// not abort it.
    fn draftable_skills(&self) -> Result<Vec<String>>;

    /// Apply every update in one batch. Either the whole batch lands or
    /// none of it does.
    fn apply_batch(&self, updates: &[ParticipantUpdate]) -> Result<()>;
}

/// Shared activity log for human-readable announcements. Fire-and-forget:
/// callers never observe failures.
pub trait ActivityLog {
    fn append(&self, line: &str);
}

impl<T: DocumentStore> DocumentStore for Arc<T> {
    fn list_participants(&self) -> Result<Vec<Participant>> {
        (**self).list_participants()
    }

    fn draftable_skills(&self) -> Result<Vec<String>> {
        (**self).draftable_skills()
    }

    fn apply_batch(&self, updates: &[ParticipantUpdate]) -> Result<()> {
        (**self).apply_batch(updates)
    }
}

impl<T: ActivityLog> ActivityLog for Arc<T> {
    fn append(&self, line: &str) {
        (**self).append(line)
    }
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// SQLite-backed store for character records and the activity log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral in-memory store (useful for
    /// tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set store pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS actors (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL,
                player_owned INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS actor_fields (
                actor_id TEXT NOT NULL REFERENCES actors(id),
                path     TEXT NOT NULL,
                value    INTEGER NOT NULL,
                PRIMARY KEY (actor_id, path)
            );

            CREATE TABLE IF NOT EXISTS activity_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                line      TEXT NOT NULL
            );
            ",
        )
        .context("failed to create store schema")?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Register a character record. Used by host tooling and tests; the
    /// draft itself never creates actors.
    pub fn insert_actor(&self, id: &str, name: &str, player_owned: bool) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO actors (id, name, player_owned) VALUES (?1, ?2, ?3)",
                params![id, name, player_owned as i64],
            )
            .context("failed to insert actor")?;
        Ok(())
    }

    /// Read a single field from a participant record, if set.
    pub fn field(&self, actor_id: &str, path: &str) -> Result<Option<i64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM actor_fields WHERE actor_id = ?1 AND path = ?2")
            .context("failed to prepare field query")?;
        let mut rows = stmt
            .query(params![actor_id, path])
            .context("failed to query field")?;
        match rows.next().context("failed to read field row")? {
            Some(row) => Ok(Some(row.get(0).context("failed to decode field value")?)),
            None => Ok(None),
        }
    }

    /// All recorded activity lines, oldest first.
    pub fn activity(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT line FROM activity_log ORDER BY id")
            .context("failed to prepare activity query")?;
        let lines = stmt
            .query_map([], |row| row.get(0))
            .context("failed to query activity log")?
            .collect::<rusqlite::Result<Vec<String>>>()
            .context("failed to read activity rows")?;
        Ok(lines)
    }

    fn record_activity(&self, line: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO activity_log (timestamp, line) VALUES (?1, ?2)",
                params![timestamp, line],
            )
            .context("failed to record activity line")?;
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn list_participants(&self) -> Result<Vec<Participant>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, player_owned FROM actors ORDER BY name, id")
            .context("failed to prepare participant query")?;
        let participants = stmt
            .query_map([], |row| {
                Ok(Participant {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    player_owned: row.get::<_, i64>(2)? != 0,
                })
            })
            .context("failed to query participants")?
            .collect::<rusqlite::Result<Vec<Participant>>>()
            .context("failed to read participant rows")?;
        Ok(participants)
    }

    fn draftable_skills(&self) -> Result<Vec<String>> {
        // The skill catalog is part of the character schema, not row data.
        Ok(schema::draftable_skill_keys())
    }

    fn apply_batch(&self, updates: &[ParticipantUpdate]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin batch transaction")?;
        for update in updates {
            for patch in &update.patches {
                tx.execute(
                    "INSERT OR REPLACE INTO actor_fields (actor_id, path, value)
                     VALUES (?1, ?2, ?3)",
                    params![update.participant_id, patch.path, patch.value],
                )
                .with_context(|| {
                    format!(
                        "failed to patch {} for {}",
                        patch.path, update.participant_id
                    )
                })?;
            }
        }
        tx.commit().context("failed to commit batch")?;
        Ok(())
    }
}

impl ActivityLog for SqliteStore {
    fn append(&self, line: &str) {
        info!(target: "activity", "{line}");
        if let Err(e) = self.record_activity(line) {
            warn!("failed to persist activity line: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    #[test]
    fn list_participants_in_stable_order() {
        let store = memory_store();
        store.insert_actor("a3", "Zed-R-ZED", true).unwrap();
        store.insert_actor("a1", "Ann-O-MLY", true).unwrap();
        store.insert_actor("a2", "Bob-U-KUP", false).unwrap();

        let participants = store.list_participants().unwrap();
        let names: Vec<&str> = participants.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann-O-MLY", "Bob-U-KUP", "Zed-R-ZED"]);
        assert!(!participants[1].player_owned);
        assert!(participants[0].player_owned);
    }

    #[test]
    fn draftable_skills_match_schema() {
        let store = memory_store();
        assert_eq!(
            store.draftable_skills().unwrap(),
            schema::draftable_skill_keys()
        );
    }

    #[test]
    fn apply_batch_writes_all_patches() {
        let store = memory_store();
        store.insert_actor("a1", "Ann-O-MLY", true).unwrap();
        store.insert_actor("a2", "Bob-U-KUP", true).unwrap();

        let updates = vec![
            ParticipantUpdate {
                participant_id: "a1".to_string(),
                patches: vec![
                    FieldPatch {
                        path: "system.abilities.violence.skills.melee.value".to_string(),
                        value: 3,
                    },
                    FieldPatch {
                        path: "system.abilities.violence.value".to_string(),
                        value: 2,
                    },
                ],
            },
            ParticipantUpdate {
                participant_id: "a2".to_string(),
                patches: vec![FieldPatch {
                    path: "system.abilities.violence.skills.melee.value".to_string(),
                    value: -3,
                }],
            },
        ];
        store.apply_batch(&updates).unwrap();

        assert_eq!(
            store
                .field("a1", "system.abilities.violence.skills.melee.value")
                .unwrap(),
            Some(3)
        );
        assert_eq!(
            store.field("a1", "system.abilities.violence.value").unwrap(),
            Some(2)
        );
        assert_eq!(
            store
                .field("a2", "system.abilities.violence.skills.melee.value")
                .unwrap(),
            Some(-3)
        );
        assert_eq!(store.field("a2", "no.such.path").unwrap(), None);
    }

    #[test]
    fn apply_batch_overwrites_existing_values() {
        let store = memory_store();
        store.insert_actor("a1", "Ann-O-MLY", true).unwrap();
        let patch = |value| {
            vec![ParticipantUpdate {
                participant_id: "a1".to_string(),
                patches: vec![FieldPatch {
                    path: "system.abilities.brains.value".to_string(),
                    value,
                }],
            }]
        };
        store.apply_batch(&patch(1)).unwrap();
        store.apply_batch(&patch(4)).unwrap();
        assert_eq!(
            store.field("a1", "system.abilities.brains.value").unwrap(),
            Some(4)
        );
    }

    #[test]
    fn activity_lines_are_recorded_in_order() {
        let store = memory_store();
        store.append("Skill draft started with 2 participants.");
        store.append("Ann-O-MLY chose Engineer. The next player receives Engineer at -1.");
        let lines = store.activity().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("started"));
        assert!(lines[1].contains("Engineer"));
    }
}
