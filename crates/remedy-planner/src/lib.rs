//! Remedy Lexicographic Planner
//!
//! Produces ranked candidate plans under strict constraint tiering:
//! - Candidate generation is pluggable behind [`CandidateSource`]
//! - Candidates containing a step the Safety Gateway's rules would block
//!   are never proposed
//! - The H0 hard floor partitions candidates before any H1/H2 comparison
//! - Among H0-feasible candidates, H1 is maximized first and ties break
//!   on H2
//! - Planning runs under a wall-clock budget; on exhaustion the best
//!   already-verified candidate wins, or `None` if none was verified

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod library;
pub mod planner;

pub use library::{ActionLibrary, ActionTemplate, CandidateSource};
pub use planner::LexicographicPlanner;
