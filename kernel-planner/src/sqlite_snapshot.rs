//! File-copy snapshot/restore for SQLite databases (spec §4.K), run
//! alongside a workdir checkpoint since git does not meaningfully diff
//! binary database files.

use std::path::{Path, PathBuf};

/// One SQLite database the planner should snapshot around mutating steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteTarget {
    /// Human-readable name, used only in emitted events.
    pub name: String,
    /// Path to the database file, absolute or relative to the workdir.
    pub path: String,
}

impl SqliteTarget {
    /// Construct a target.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self { name: name.into(), path: path.into() }
    }
}

fn resolve(workdir: &str, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        Path::new(workdir).join(p)
    }
}

fn snapshot_path(db: &Path, checkpoint_id: &str) -> PathBuf {
    let name = db.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    db.with_file_name(format!("{name}.rfsn_snap.{checkpoint_id}"))
}

/// Copy every existing target database to `<path>.rfsn_snap.<checkpoint_id>`.
/// Targets whose database does not yet exist are skipped; rollback will
/// skip them too. Returns the snapshot paths actually created.
pub fn snapshot_sqlite_files(workdir: &str, targets: &[SqliteTarget], checkpoint_id: &str) -> std::io::Result<Vec<String>> {
    let mut created = Vec::new();
    for target in targets {
        let db = resolve(workdir, &target.path);
        if !db.exists() {
            continue;
        }
        let snap = snapshot_path(&db, checkpoint_id);
        if let Some(parent) = snap.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&db, &snap)?;
        created.push(snap.to_string_lossy().to_string());
    }
    Ok(created)
}

/// Restore each target database from its `checkpoint_id` snapshot. A
/// missing snapshot is skipped silently — rollback never fails because a
/// database didn't exist at checkpoint time.
pub fn restore_sqlite_files(workdir: &str, targets: &[SqliteTarget], checkpoint_id: &str) -> std::io::Result<()> {
    for target in targets {
        let db = resolve(workdir, &target.path);
        let snap = snapshot_path(&db, checkpoint_id);
        if !snap.exists() {
            continue;
        }
        if let Some(parent) = db.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&snap, &db)?;
    }
    Ok(())
}

/// Keep only the `keep_last` most recently modified snapshots per target
/// database, deleting the rest. Deletion failures are ignored — cleanup is
/// best-effort and never blocks the plan it runs alongside.
pub fn cleanup_sqlite_snaps(workdir: &str, targets: &[SqliteTarget], keep_last: usize) {
    for target in targets {
        let db = resolve(workdir, &target.path);
        let Some(parent) = db.parent() else { continue };
        let Ok(entries) = std::fs::read_dir(parent) else { continue };
        let prefix = format!("{}.rfsn_snap.", db.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());

        let mut snaps: Vec<(std::time::SystemTime, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()).map(|mtime| (mtime, e.path())))
            .collect();

        snaps.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in snaps.into_iter().skip(keep_last) {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_skips_databases_that_do_not_exist_yet() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().to_string_lossy().to_string();
        let targets = [SqliteTarget::new("app", "app.db")];
        let created = snapshot_sqlite_files(&workdir, &targets, "cp1").unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn snapshot_then_restore_round_trips_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().to_string_lossy().to_string();
        let db_path = dir.path().join("app.db");
        std::fs::write(&db_path, "v1").unwrap();
        let targets = [SqliteTarget::new("app", "app.db")];

        snapshot_sqlite_files(&workdir, &targets, "cp1").unwrap();
        std::fs::write(&db_path, "v2").unwrap();
        restore_sqlite_files(&workdir, &targets, "cp1").unwrap();

        assert_eq!(std::fs::read_to_string(&db_path).unwrap(), "v1");
    }

    #[test]
    fn cleanup_keeps_only_the_newest_n_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().to_string_lossy().to_string();
        let db_path = dir.path().join("app.db");
        std::fs::write(&db_path, "v0").unwrap();
        let targets = [SqliteTarget::new("app", "app.db")];

        for i in 0..5 {
            snapshot_sqlite_files(&workdir, &targets, &format!("cp{i}")).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        cleanup_sqlite_snaps(&workdir, &targets, 2);

        let remaining = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains("rfsn_snap"))
            .count();
        assert_eq!(remaining, 2);
    }
}
