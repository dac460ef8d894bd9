//! Session lifecycle management.
//!
//! Owns active sessions (at most one per user) and a bounded per-user history
//! of ended sessions.
//!
//! ## Lifecycle
//!
//! ```text
//! start_session
//!   │
//!   ├─► ends the user's previous active session (replaced)
//!   │
//!   └─► fresh session: default preferences + overrides, captured metadata
//!
//! While active
//!   │
//!   ├─► preferences / contexts / patterns / personalizations
//!   │
//!   └─► every mutation records activity (idle clock reset)
//!
//! Session end (explicit, replaced, expired, shutdown)
//!   │
//!   ├─► endTime + final duration
//!   │
//!   └─► appended to history, oldest evicted past the bound
//! ```
//!
//! Expiry is enforced both by the cleanup sweep and lazily on every access,
//! so an idle session is never handed out as active.

mod merge;
mod metrics;
mod store;

pub use merge::merge_into;
pub use metrics::compute_metrics;
pub use store::{ActiveLookup, SessionStore, UserSessions};
