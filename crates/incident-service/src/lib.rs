pub mod alert_store;
pub mod config;
pub mod error;
mod persistence;
pub mod seed;
pub mod service;
pub mod stamp;
pub mod submit;
pub mod sync;
#[cfg(test)]
mod testing;
pub mod ticket_store;
pub mod types;

// Re-export commonly used types
pub use alert_store::{AlertStore, ALERTS_KEY, DEFAULT_ADMIN};
pub use config::{IncidentConfig, StorageBackend};
pub use error::IncidentError;
pub use service::{
    AdminAction, AdminOutcome, AlwaysConfirm, ConfirmPrompt, Confirmation, IncidentService,
    NeverConfirm,
};
pub use submit::{SubmitGate, SubmitLatency};
pub use sync::{spawn_sync, SyncTarget};
pub use ticket_store::{TicketStore, TICKETS_KEY};
pub use types::*;
