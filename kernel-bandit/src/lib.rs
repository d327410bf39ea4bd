//! # kernel-bandit — multi-dimensional bandit learner
//!
//! Learns, independently per [`kernel_types::Category`], which arm tends to
//! pay off best in a given context: Thompson sampling, UCB1, and
//! epsilon-greedy selection in [`bandit`], persisted history in
//! [`OutcomeStore`], and [`MultiArmLearner`] tying the two together across
//! every category in one selection.

#![deny(missing_docs)]

mod bandit;
mod error;
mod learner;
mod store;

pub use bandit::{epsilon_greedy_select, estimate_regret, select_arm, thompson_select, ucb_select, BanditAlgorithm};
pub use error::BanditError;
pub use learner::{ArmCatalog, MultiArmLearner, MultiArmSelection};
pub use store::OutcomeStore;
