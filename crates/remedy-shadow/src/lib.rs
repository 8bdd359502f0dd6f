//! Remedy Shadow Harness
//!
//! Runs isolated trial sessions alongside production:
//! - A session owns its own state store; writes inside it never touch
//!   production storage
//! - Production inputs are mirrored in asynchronously and best-effort
//!   through a bounded queue that drops on overflow, so the production
//!   request path never blocks on a session
//! - A session may load a known-bad configuration to measure degradation;
//!   the production compliance index is sampled before and after and must
//!   be observably unchanged
//! - `end_session` tears the store down and reports metrics deltas and the
//!   mirrored-vs-production divergence count (zero under correct mirroring)

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod harness;
pub mod session;

pub use harness::{ComplianceProbe, ShadowHarness};
pub use session::{MirroredInput, SessionId, ShadowConfig, ShadowReport, ShadowSession};
