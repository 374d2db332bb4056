// crates/core/src/lib.rs
pub mod completion;
pub mod config;
pub mod connection;
pub mod error;
pub mod event_log;
pub mod metrics;
pub mod monitor;
pub mod reducer;
pub mod state;
pub mod transport;

pub use completion::CompletionController;
pub use config::*;
pub use connection::{ConnectionManager, Subscription, TransportEvent};
pub use error::*;
pub use event_log::{EventLog, EVENT_LOG_CAPACITY};
pub use metrics::*;
pub use monitor::*;
pub use reducer::{apply_snapshot, Reduction};
pub use state::*;
pub use transport::*;

pub use syncwatch_types::{Snapshot, SnapshotParseError, SyncStatus};
