//! SQLite-backed persistence for bandit outcomes (spec §5).
//!
//! A single `outcomes` table carries both the scalar fields every pull
//! produces and the richer duration/detail fields a [`RichOutcome`] adds —
//! there is no separate legacy/extended schema split, since
//! [`kernel_types::OutcomeRecord`]/[`RichOutcome`] never distinguish the two
//! at the type level.

use kernel_types::{ArmKey, ArmPerformance, ArmStats, ContextKey, OutcomeRecord, RichOutcome};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::error::BanditError;

const CREATE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS outcomes (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    context_key   TEXT NOT NULL,
    arm_key       TEXT NOT NULL,
    reward        REAL NOT NULL,
    cost          TEXT NOT NULL,
    success       INTEGER NOT NULL,
    duration_ms   INTEGER NOT NULL DEFAULT 0,
    detail_json   TEXT NOT NULL DEFAULT 'null',
    ts_utc        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_outcomes_context_arm ON outcomes(context_key, arm_key);
CREATE INDEX IF NOT EXISTS idx_outcomes_arm ON outcomes(arm_key);
";

/// A SQLite-backed record of every arm pull, queryable per context for
/// selection and globally for reporting.
pub struct OutcomeStore {
    conn: Mutex<Connection>,
}

impl OutcomeStore {
    /// Open (creating if necessary) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BanditError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| BanditError::Store(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory store, useful for tests and scripted runs that
    /// don't need the outcome history to outlive the process.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, BanditError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Record a scalar outcome.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a write failure.
    pub fn record(&self, ts_utc: &str, record: &OutcomeRecord) -> Result<(), BanditError> {
        self.insert(ts_utc, record, 0, &serde_json::Value::Null)
    }

    /// Record a rich outcome, preserving its duration and detail payload.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a write failure.
    pub fn record_rich(&self, ts_utc: &str, rich: &RichOutcome) -> Result<(), BanditError> {
        self.insert(ts_utc, &rich.record, rich.duration_ms, &rich.detail)
    }

    fn insert(
        &self,
        ts_utc: &str,
        record: &OutcomeRecord,
        duration_ms: u64,
        detail: &serde_json::Value,
    ) -> Result<(), BanditError> {
        let detail_json = serde_json::to_string(detail).map_err(|e| BanditError::Codec(e.to_string()))?;
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        conn.execute(
            "INSERT INTO outcomes
                (context_key, arm_key, reward, cost, success, duration_ms, detail_json, ts_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.context_key.as_str(),
                record.arm.as_str(),
                record.reward,
                record.cost.to_string(),
                record.success,
                duration_ms,
                detail_json,
                ts_utc,
            ],
        )?;
        Ok(())
    }

    /// Per-arm pull count and mean reward under `context_key`, the shape
    /// [`crate::bandit::select_arm`] consumes directly.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a query failure.
    pub fn summary(&self, context_key: &ContextKey) -> Result<Vec<(ArmKey, ArmStats)>, BanditError> {
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        let mut stmt = conn.prepare(
            "SELECT arm_key, COUNT(*), AVG(reward)
             FROM outcomes WHERE context_key = ?1
             GROUP BY arm_key",
        )?;
        let rows = stmt.query_map(params![context_key.as_str()], |row| {
            let arm_key: String = row.get(0)?;
            let n: u32 = row.get(1)?;
            let mean: f64 = row.get(2)?;
            Ok((ArmKey::new(arm_key), ArmStats { n, mean, m2: 0.0 }))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BanditError::from)
    }

    /// Global performance of one arm across every context it has been
    /// pulled in.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a query failure.
    pub fn arm_performance(&self, arm: &ArmKey) -> Result<ArmPerformance, BanditError> {
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        let row = conn.query_row(
            "SELECT COUNT(*), AVG(reward), AVG(success)
             FROM outcomes WHERE arm_key = ?1",
            params![arm.as_str()],
            |row| {
                let pulls: u32 = row.get(0)?;
                let mean_reward: Option<f64> = row.get(1)?;
                let success_rate: Option<f64> = row.get(2)?;
                Ok((pulls, mean_reward, success_rate))
            },
        )?;
        let (pulls, mean_reward, success_rate) = row;
        if pulls == 0 {
            return Ok(ArmPerformance::unseen());
        }
        Ok(ArmPerformance {
            pulls,
            mean_reward: mean_reward.unwrap_or(0.0),
            success_rate: success_rate.unwrap_or(0.0),
        })
    }

    /// The most recently recorded outcomes across every context, most
    /// recent first.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a query failure, or
    /// [`BanditError::Codec`] if a stored cost or detail payload is corrupt.
    pub fn recent(&self, limit: u32) -> Result<Vec<RichOutcome>, BanditError> {
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        let mut stmt = conn.prepare(
            "SELECT context_key, arm_key, reward, cost, success, duration_ms, detail_json
             FROM outcomes ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let context_key: String = row.get(0)?;
            let arm_key: String = row.get(1)?;
            let reward: f64 = row.get(2)?;
            let cost: String = row.get(3)?;
            let success: bool = row.get(4)?;
            let duration_ms: u64 = row.get(5)?;
            let detail_json: String = row.get(6)?;
            Ok((context_key, arm_key, reward, cost, success, duration_ms, detail_json))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (context_key, arm_key, reward, cost, success, duration_ms, detail_json) = row?;
            let cost = cost.parse().map_err(|_| BanditError::Codec(format!("bad cost value: {cost}")))?;
            let detail = serde_json::from_str(&detail_json).map_err(|e| BanditError::Codec(e.to_string()))?;
            out.push(RichOutcome {
                record: OutcomeRecord {
                    context_key: ContextKey::new(context_key),
                    arm: ArmKey::new(arm_key),
                    reward,
                    cost,
                    success,
                },
                duration_ms,
                detail,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(ctx: &str, arm: &str, reward: f64, success: bool) -> OutcomeRecord {
        OutcomeRecord::new(ContextKey::new(ctx), ArmKey::new(arm), reward, success)
    }

    #[test]
    fn record_then_summary_aggregates_by_context_and_arm() {
        let store = OutcomeStore::open_in_memory().unwrap();
        store.record("2026-01-01T00:00:00Z", &outcome("repo::rust", "plan::direct", 1.0, true)).unwrap();
        store.record("2026-01-01T00:00:01Z", &outcome("repo::rust", "plan::direct", 0.0, false)).unwrap();
        store.record("2026-01-01T00:00:02Z", &outcome("repo::rust", "plan::decompose", 0.5, true)).unwrap();

        let summary = store.summary(&ContextKey::new("repo::rust")).unwrap();
        let direct = summary.iter().find(|(arm, _)| arm.as_str() == "plan::direct").unwrap();
        assert_eq!(direct.1.n, 2);
        assert!((direct.1.mean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn summary_is_scoped_to_its_context() {
        let store = OutcomeStore::open_in_memory().unwrap();
        store.record("2026-01-01T00:00:00Z", &outcome("repo::a", "plan::direct", 1.0, true)).unwrap();
        store.record("2026-01-01T00:00:00Z", &outcome("repo::b", "plan::direct", 0.0, false)).unwrap();

        let summary = store.summary(&ContextKey::new("repo::a")).unwrap();
        assert_eq!(summary.len(), 1);
        assert!((summary[0].1.mean - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rich_outcomes_round_trip_detail_and_duration() {
        let store = OutcomeStore::open_in_memory().unwrap();
        let rich = RichOutcome {
            record: outcome("repo::rust", "test::full", 0.9, true),
            duration_ms: 4200,
            detail: serde_json::json!({"tests_passed": 12}),
        };
        store.record_rich("2026-01-01T00:00:00Z", &rich).unwrap();

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].duration_ms, 4200);
        assert_eq!(recent[0].detail, serde_json::json!({"tests_passed": 12}));
    }

    #[test]
    fn arm_performance_is_unseen_before_any_pulls() {
        let store = OutcomeStore::open_in_memory().unwrap();
        let perf = store.arm_performance(&ArmKey::new("plan::direct")).unwrap();
        assert_eq!(perf.pulls, 0);
    }

    #[test]
    fn arm_performance_aggregates_globally_across_contexts() {
        let store = OutcomeStore::open_in_memory().unwrap();
        store.record("2026-01-01T00:00:00Z", &outcome("repo::a", "plan::direct", 1.0, true)).unwrap();
        store.record("2026-01-01T00:00:00Z", &outcome("repo::b", "plan::direct", 0.0, false)).unwrap();

        let perf = store.arm_performance(&ArmKey::new("plan::direct")).unwrap();
        assert_eq!(perf.pulls, 2);
        assert!((perf.mean_reward - 0.5).abs() < 1e-9);
        assert!((perf.success_rate - 0.5).abs() < 1e-9);
    }
}
