//! Player session management for Castle.
//!
//! A session binds one live connection to one `(room, seat)` pair and
//! survives transient disconnects: every session carries a secret
//! reconnection token, and a dropped player who presents it within the
//! grace window gets their seat back as if nothing happened.
//!
//! # Key types
//!
//! - [`SessionManager`] — creates, resolves, resumes, and reaps sessions
//! - [`Session`] / [`SessionState`] — the per-player record and its
//!   connected/disconnected/expired lifecycle
//! - [`SessionConfig`] — grace-window settings

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
