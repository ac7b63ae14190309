//! Best-effort propagation of appointment changes to staff calendars.

pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod google;
pub mod orchestrator;
pub mod ports;
pub mod resolver;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::{CredentialRefresher, GoogleTokenExchange};
pub use dispatcher::{SyncDispatcher, SyncJob};
pub use google::GoogleCalendarTransport;
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use ports::{AppointmentStore, OwnerDirectory};
pub use resolver::{OwnerResolver, SessionActor};
pub use transport::CalendarTransport;
