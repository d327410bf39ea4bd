//! The two snapshot flavors the ledger can hash and record, mirroring the
//! gate's own repo/world split.

use kernel_types::{RepoSnapshot, WorldSnapshot};
use serde::Serialize;

/// Either flavor of controllable-state snapshot a ledger entry can be
/// recorded against.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum LedgerState<'a> {
    /// A working-tree view.
    Repo(&'a RepoSnapshot),
    /// A session view.
    World(&'a WorldSnapshot),
}

impl<'a> From<&'a RepoSnapshot> for LedgerState<'a> {
    fn from(value: &'a RepoSnapshot) -> Self {
        LedgerState::Repo(value)
    }
}

impl<'a> From<&'a WorldSnapshot> for LedgerState<'a> {
    fn from(value: &'a WorldSnapshot) -> Self {
        LedgerState::World(value)
    }
}
