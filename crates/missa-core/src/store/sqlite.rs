//! SQLite-backed intention store.
//!
//! One database holds one holder's intentions, celebration events and daily
//! status. Intention state is stored as JSON next to the columns used for
//! filtering (`kind`, `active`) and natural-key lookup (`title`, `kind`,
//! `source`).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    CelebrationCommit, CommittedCelebration, IntentionFilter, IntentionStore, Mutation,
};
use crate::error::{MissaError, MissaResult};
use crate::types::{
    CelebrationEvent, DailyStatus, EventOrigin, Intention, IntentionId, IntentionKind,
    IntentionSource, IntentionState, NewIntention, YearMonth,
};

const INTENTION_COLUMNS: &str =
    "id, title, source, notes, state, created_at, updated_at, version";

const EVENT_COLUMNS: &str =
    "id, intention_id, celebration_date, notes, origin, quota_relaxed, created_at";

/// SQLite-backed intention store
pub struct SqliteIntentionStore {
    conn: Mutex<Connection>,
}

impl SqliteIntentionStore {
    /// Create a new store at the given path
    pub fn new(path: impl AsRef<Path>) -> MissaResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> MissaResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> MissaResult<()> {
        let conn = self.conn.lock()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS intentions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                source TEXT NOT NULL,
                notes TEXT,
                state TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_intentions_kind ON intentions(kind);
            CREATE INDEX IF NOT EXISTS idx_intentions_active ON intentions(active);
            CREATE INDEX IF NOT EXISTS idx_intentions_natural_key
                ON intentions(title, kind, source);

            CREATE TABLE IF NOT EXISTS celebrations (
                id TEXT PRIMARY KEY,
                intention_id TEXT NOT NULL,
                intention_kind TEXT NOT NULL,
                celebration_date TEXT NOT NULL,
                notes TEXT,
                origin TEXT NOT NULL,
                quota_relaxed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (intention_id) REFERENCES intentions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_celebrations_intention
                ON celebrations(intention_id, celebration_date);
            CREATE INDEX IF NOT EXISTS idx_celebrations_kind_date
                ON celebrations(intention_kind, celebration_date);

            -- Events are permanent history
            CREATE TRIGGER IF NOT EXISTS celebrations_no_update
                BEFORE UPDATE ON celebrations
                BEGIN SELECT RAISE(ABORT, 'celebration events are immutable'); END;
            CREATE TRIGGER IF NOT EXISTS celebrations_no_delete
                BEFORE DELETE ON celebrations
                BEGIN SELECT RAISE(ABORT, 'celebration events are immutable'); END;

            CREATE TABLE IF NOT EXISTS daily_status (
                date TEXT PRIMARY KEY,
                celebrated_mass INTEGER NOT NULL,
                reason_not_celebrated TEXT,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> MissaResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| MissaError::parse(e.to_string()))
}

fn parse_timestamp(s: &str) -> MissaResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MissaError::parse(e.to_string()))
}

fn parse_uuid(s: &str) -> MissaResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| MissaError::parse(e.to_string()))
}

fn kind_name(kind: IntentionKind) -> &'static str {
    kind.into()
}

fn source_name(source: IntentionSource) -> &'static str {
    source.into()
}

fn row_to_intention(row: &rusqlite::Row<'_>) -> MissaResult<Intention> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let source: String = row.get(2)?;
    let notes: Option<String> = row.get(3)?;
    let state: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    let version: i64 = row.get(7)?;

    Ok(Intention {
        id: parse_uuid(&id)?,
        title,
        source: IntentionSource::from_str(&source)
            .map_err(|_| MissaError::parse(format!("unknown source '{}'", source)))?,
        notes,
        state: serde_json::from_str::<IntentionState>(&state)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        version: version as u64,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> MissaResult<CelebrationEvent> {
    let id: String = row.get(0)?;
    let intention_id: String = row.get(1)?;
    let celebration_date: String = row.get(2)?;
    let notes: Option<String> = row.get(3)?;
    let origin: String = row.get(4)?;
    let quota_relaxed: i32 = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(CelebrationEvent {
        id: parse_uuid(&id)?,
        intention_id: parse_uuid(&intention_id)?,
        celebration_date: parse_date(&celebration_date)?,
        notes,
        origin: EventOrigin::from_str(&origin)
            .map_err(|_| MissaError::parse(format!("unknown event origin '{}'", origin)))?,
        quota_relaxed: quota_relaxed != 0,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn fetch_intention(conn: &Connection, id: IntentionId) -> MissaResult<Option<Intention>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM intentions WHERE id = ?1",
        INTENTION_COLUMNS
    ))?;

    stmt.query_row(params![id.to_string()], |row| Ok(row_to_intention(row)))
        .optional()?
        .transpose()
}

/// The single routine that writes intention state.
fn apply_mutation_in(
    conn: &Connection,
    id: IntentionId,
    mutation: &Mutation,
) -> MissaResult<Intention> {
    let current = fetch_intention(conn, id)?.ok_or_else(|| MissaError::not_found(id.to_string()))?;
    let state = mutation.apply(&current.state)?;
    let now = Utc::now();

    let changed = conn.execute(
        r#"UPDATE intentions SET state = ?2, active = ?3, updated_at = ?4, version = version + 1
           WHERE id = ?1 AND version = ?5"#,
        params![
            id.to_string(),
            serde_json::to_string(&state)?,
            state.is_active() as i32,
            now.to_rfc3339(),
            current.version as i64,
        ],
    )?;
    if changed == 0 {
        return Err(MissaError::stale(format!(
            "intention {} changed since version {}",
            id, current.version
        )));
    }

    debug!(intention_id = %id, mutation = mutation.name(), version = current.version + 1, "Applied mutation");

    Ok(Intention {
        state,
        updated_at: now,
        version: current.version + 1,
        ..current
    })
}

fn count_personal_in(conn: &Connection, month: YearMonth) -> MissaResult<u32> {
    let count: i64 = conn.query_row(
        r#"SELECT COUNT(*) FROM celebrations
           WHERE intention_kind = ?1 AND celebration_date >= ?2 AND celebration_date <= ?3"#,
        params![
            kind_name(IntentionKind::Personal),
            fmt_date(month.first_day()),
            fmt_date(month.last_day()),
        ],
        |row| row.get(0),
    )?;
    u32::try_from(count)
        .map_err(|_| MissaError::database(format!("personal count {} out of range", count)))
}

impl IntentionStore for SqliteIntentionStore {
    fn create(&self, new: NewIntention) -> MissaResult<Intention> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(MissaError::missing_field("title"));
        }
        let state = new.spec.initial_state()?;
        let now = Utc::now();
        let intention = Intention {
            id: Uuid::new_v4(),
            title,
            source: new.source,
            notes: new.notes.filter(|n| !n.trim().is_empty()),
            state,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let conn = self.conn.lock()?;
        conn.execute(
            r#"INSERT INTO intentions
               (id, title, kind, source, notes, state, active, created_at, updated_at, version)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                intention.id.to_string(),
                intention.title,
                kind_name(intention.kind()),
                source_name(intention.source),
                intention.notes,
                serde_json::to_string(&intention.state)?,
                intention.is_active() as i32,
                intention.created_at.to_rfc3339(),
                intention.updated_at.to_rfc3339(),
                0i64,
            ],
        )?;
        Ok(intention)
    }

    fn get(&self, id: IntentionId) -> MissaResult<Option<Intention>> {
        let conn = self.conn.lock()?;
        fetch_intention(&conn, id)
    }

    fn find_by_natural_key(
        &self,
        title: &str,
        kind: IntentionKind,
        source: IntentionSource,
    ) -> MissaResult<Option<Intention>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM intentions
               WHERE title = ?1 AND kind = ?2 AND source = ?3
               ORDER BY created_at, rowid LIMIT 1"#,
            INTENTION_COLUMNS
        ))?;

        stmt.query_row(
            params![title.trim(), kind_name(kind), source_name(source)],
            |row| Ok(row_to_intention(row)),
        )
        .optional()?
        .transpose()
    }

    fn list(&self, filter: &IntentionFilter) -> MissaResult<Vec<Intention>> {
        let conn = self.conn.lock()?;
        let mut sql = format!("SELECT {} FROM intentions", INTENTION_COLUMNS);
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = filter.kind {
            values.push(Value::Text(kind_name(kind).to_string()));
            clauses.push(format!("kind = ?{}", values.len()));
        }
        if let Some(active) = filter.active {
            values.push(Value::Integer(active as i64));
            clauses.push(format!("active = ?{}", values.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at, rowid");

        let mut stmt = conn.prepare(&sql)?;
        let results = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(row_to_intention(row))
        })?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn apply_mutation(&self, id: IntentionId, mutation: Mutation) -> MissaResult<Intention> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let updated = apply_mutation_in(&tx, id, &mutation)?;
        tx.commit()?;
        Ok(updated)
    }

    fn commit_celebration(&self, commit: CelebrationCommit) -> MissaResult<CommittedCelebration> {
        let CelebrationCommit {
            mut event,
            mutations,
            quota,
        } = commit;

        let mut conn = self.conn.lock()?;
        // Dropping the transaction without commit rolls every step back
        let tx = conn.transaction()?;

        let target = fetch_intention(&tx, event.intention_id)?
            .ok_or_else(|| MissaError::not_found(event.intention_id.to_string()))?;

        if let Some(guard) = quota {
            let used = count_personal_in(&tx, guard.month)?;
            if used >= guard.limit {
                if !guard.relaxed {
                    return Err(MissaError::quota_exceeded(used, guard.limit));
                }
                event.quota_relaxed = true;
            }
        }

        tx.execute(
            r#"INSERT INTO celebrations
               (id, intention_id, intention_kind, celebration_date, notes, origin, quota_relaxed, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                event.id.to_string(),
                event.intention_id.to_string(),
                kind_name(target.kind()),
                fmt_date(event.celebration_date),
                event.notes,
                <&'static str>::from(event.origin),
                event.quota_relaxed as i32,
                event.created_at.to_rfc3339(),
            ],
        )?;

        let mut intention = target;
        let mut also_changed = Vec::new();
        for (id, mutation) in &mutations {
            let updated = apply_mutation_in(&tx, *id, mutation)?;
            if *id == event.intention_id {
                intention = updated;
            } else {
                also_changed.push(updated);
            }
        }

        tx.execute(
            r#"INSERT INTO daily_status (date, celebrated_mass, reason_not_celebrated, updated_at)
               VALUES (?1, 1, NULL, ?2)
               ON CONFLICT(date) DO UPDATE SET
                   celebrated_mass = 1, reason_not_celebrated = NULL, updated_at = excluded.updated_at"#,
            params![fmt_date(event.celebration_date), Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;

        Ok(CommittedCelebration {
            event,
            intention,
            also_changed,
        })
    }

    fn events_for(&self, id: IntentionId) -> MissaResult<Vec<CelebrationEvent>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM celebrations
               WHERE intention_id = ?1
               ORDER BY celebration_date, created_at"#,
            EVENT_COLUMNS
        ))?;

        let results = stmt.query_map(params![id.to_string()], |row| Ok(row_to_event(row)))?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn events_on(&self, date: NaiveDate) -> MissaResult<Vec<CelebrationEvent>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM celebrations
               WHERE celebration_date = ?1
               ORDER BY created_at"#,
            EVENT_COLUMNS
        ))?;

        let results = stmt.query_map(params![fmt_date(date)], |row| Ok(row_to_event(row)))?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn has_event_on(&self, id: IntentionId, date: NaiveDate) -> MissaResult<bool> {
        let conn = self.conn.lock()?;
        let exists: i64 = conn.query_row(
            r#"SELECT EXISTS(
                   SELECT 1 FROM celebrations WHERE intention_id = ?1 AND celebration_date = ?2
               )"#,
            params![id.to_string(), fmt_date(date)],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    fn count_personal_in_month(&self, month: YearMonth) -> MissaResult<u32> {
        let conn = self.conn.lock()?;
        count_personal_in(&conn, month)
    }

    fn daily_status(&self, date: NaiveDate) -> MissaResult<Option<DailyStatus>> {
        let conn = self.conn.lock()?;
        let row = conn
            .query_row(
                r#"SELECT celebrated_mass, reason_not_celebrated, updated_at
                   FROM daily_status WHERE date = ?1"#,
                params![fmt_date(date)],
                |row| {
                    let celebrated: i32 = row.get(0)?;
                    let reason: Option<String> = row.get(1)?;
                    let updated_at: String = row.get(2)?;
                    Ok((celebrated, reason, updated_at))
                },
            )
            .optional()?;

        row.map(|(celebrated, reason, updated_at)| {
            Ok(DailyStatus {
                date,
                celebrated_mass: celebrated != 0,
                reason_not_celebrated: reason,
                updated_at: parse_timestamp(&updated_at)?,
            })
        })
        .transpose()
    }

    fn set_daily_status(&self, status: &DailyStatus) -> MissaResult<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            r#"INSERT INTO daily_status (date, celebrated_mass, reason_not_celebrated, updated_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(date) DO UPDATE SET
                   celebrated_mass = excluded.celebrated_mass,
                   reason_not_celebrated = excluded.reason_not_celebrated,
                   updated_at = excluded.updated_at"#,
            params![
                fmt_date(status.date),
                status.celebrated_mass as i32,
                status.reason_not_celebrated,
                status.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
