//! Engine modules: the logic that turns a renumbering intent into a checked plan.
//!
//! The engine sits between scanning (what is on disk) and execution (which
//! files get renamed). Nothing here mutates the filesystem.

pub mod plan;
pub mod validate;

pub use plan::{build_plan, Plan, RenamePlanEntry};
pub use validate::validate_plan;
