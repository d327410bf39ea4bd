//! What [`crate::run_turn`] returns (spec §4.L step 7).

/// The outcome of one call to [`crate::run_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    /// The final message shown to the user.
    pub message: String,
    /// Reasoner rounds actually taken.
    pub steps_taken: u32,
    /// Total actions the reasoner proposed across all rounds.
    pub actions_proposed: u32,
    /// Actions the gate allowed.
    pub actions_allowed: u32,
    /// Actions the gate denied.
    pub actions_denied: u32,
    /// Tool calls served from the replay store instead of a live dispatch.
    pub actions_replayed: u32,
}
