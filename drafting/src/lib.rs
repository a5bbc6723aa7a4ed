//! Drafting workflow engine
//!
//! Drives a single legal-drafting task from reference upload through
//! assumption negotiation and simulated drafting to a reviewable draft, with
//! background jobs, notifications and chat tabs alongside. The pure state
//! machine lives in [`session`]; [`actors`] wraps it in a ractor actor with a
//! real-time ticker for use from async hosts.

pub mod actors;
pub mod clock;
pub mod config;
pub mod session;
pub mod timers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, WorkflowConfig};
pub use session::{DraftingSession, WorkflowError};
