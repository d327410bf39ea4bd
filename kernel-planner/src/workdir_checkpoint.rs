//! Git-backed workdir checkpoint/rollback (spec §4.K), grounded in
//! `examples/aptos-labs-aptos-core`'s use of `git2` for repository plumbing
//! — the teacher has no workdir-rollback precedent of its own.

use git2::{IndexAddOption, Repository, ResetType, Signature};
use std::path::Path;

/// What can go wrong checkpointing or restoring a workdir.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// The underlying git operation failed.
    #[error("git: {0}")]
    Git(#[from] git2::Error),
    /// The workdir path could not be created or inspected.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

fn committer() -> Result<Signature<'static>, CheckpointError> {
    Ok(Signature::now("rfsn-planner", "rfsn-planner@local")?)
}

/// Ensure `workdir` is a git repository: open it if one exists, otherwise
/// initialize it, set a local commit identity, and create an empty initial
/// commit so `HEAD` always resolves.
pub fn ensure_git_repo(workdir: &str) -> Result<Repository, CheckpointError> {
    std::fs::create_dir_all(workdir)?;
    if let Ok(repo) = Repository::open(workdir) {
        return Ok(repo);
    }

    let repo = Repository::init(workdir)?;
    {
        let mut config = repo.config()?;
        config.set_str("user.name", "RFSN Planner")?;
        config.set_str("user.email", "rfsn@local")?;
    }
    let sig = committer()?;
    let tree_id = repo.index()?.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    repo.commit(Some("HEAD"), &sig, &sig, "checkpoint:init", &tree, &[])?;
    drop(tree);
    Ok(repo)
}

/// Stage every change under `workdir` and create a checkpoint commit,
/// allowed to be empty. Returns the resulting commit's hex hash.
pub fn checkpoint(workdir: &str, label: &str) -> Result<String, CheckpointError> {
    let repo = ensure_git_repo(workdir)?;
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let sig = committer()?;
    let parent = repo.head()?.peel_to_commit()?;

    let commit_id = repo.commit(Some("HEAD"), &sig, &sig, &format!("checkpoint:{label}"), &tree, &[&parent])?;
    Ok(commit_id.to_string())
}

/// Hard-reset `workdir` to `commit` and remove untracked files created
/// since, mirroring `git reset --hard && git clean -fd`.
pub fn reset_hard(workdir: &str, commit: &str) -> Result<(), CheckpointError> {
    let repo = ensure_git_repo(workdir)?;
    let object = repo.revparse_single(commit)?;
    repo.reset(&object, ResetType::Hard, None)?;

    let mut status_opts = git2::StatusOptions::new();
    status_opts.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = repo.statuses(Some(&mut status_opts))?;
    let workdir_path = repo.workdir().map(Path::to_path_buf).unwrap_or_else(|| Path::new(workdir).to_path_buf());
    for entry in statuses.iter() {
        if entry.status().contains(git2::Status::WT_NEW) {
            if let Some(relpath) = entry.path() {
                let _ = std::fs::remove_file(workdir_path.join(relpath));
            }
        }
    }
    Ok(())
}

/// The current `HEAD` commit hash, or `None` if `workdir` is not (yet) a
/// git repository.
#[must_use]
pub fn get_current_commit(workdir: &str) -> Option<String> {
    let repo = Repository::open(workdir).ok()?;
    let head = repo.head().ok()?.peel_to_commit().ok()?;
    Some(head.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_git_repo_initializes_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        ensure_git_repo(&path).unwrap();
        ensure_git_repo(&path).unwrap();
        assert!(get_current_commit(&path).is_some());
    }

    #[test]
    fn checkpoint_and_reset_hard_restores_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let file = dir.path().join("x.txt");
        std::fs::write(&file, "A").unwrap();
        let first = checkpoint(&path, "plan_start").unwrap();

        std::fs::write(&file, "B").unwrap();
        std::fs::write(dir.path().join("y.txt"), "C").unwrap();
        checkpoint(&path, "before_step_0").unwrap();

        reset_hard(&path, &first).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "A");
        assert!(!dir.path().join("y.txt").exists());
    }

    #[test]
    fn get_current_commit_is_none_for_a_non_repo_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(get_current_commit(&dir.path().to_string_lossy()).is_none());
    }
}
