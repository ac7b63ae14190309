//! Session identity for API requests.
//!
//! Login itself happens elsewhere; this module only validates the bearer JWT
//! (or auth cookie) and loads the staff member it names. That staff record is
//! the "session owner" the calendar sync falls back to for unassigned
//! appointments.

pub mod jwt;
mod session;

pub use session::{extract_session_actor, AuthConfig};
