//! Date computation and effort aggregation.
//!
//! The forward pass ignores resource capacity; see [`crate::leveling`]
//! for that.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4

mod forward;
mod rollup;

pub use forward::{ForwardPass, ForwardScheduler};
pub use rollup::SprintTotals;
