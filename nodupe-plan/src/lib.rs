//! Transforms catalog duplicate groups into an ordered, serialized plan.
//!
//! A pure function over a sorted list producing keep/remove marks, with a
//! no-materialize-everything streaming discipline: one group loaded at a
//! time via `find_duplicates_by_hash`.

mod error;
mod planner;
mod strategy;

pub use error::PlanError;
pub use planner::{plan, NonKeeperAction, PlanSummary};
pub use strategy::{InteractiveChooser, KeeperStrategy};
