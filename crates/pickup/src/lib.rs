//! Order pickup board.
//!
//! Mirrors today's order status from the point-of-sale database into a local
//! cache and serves a board of orders being prepared and ready to collect.
//!
//! - [`reconciler`] polls the source and merges rows into the cache
//! - [`snapshot`] projects the cache into the board view
//! - [`reset`] wipes the cache at startup when stale and once a day
//! - [`service`] and [`http`] expose the board and the collected toggle

pub mod app;
pub mod config;
pub mod http;
pub mod reconciler;
pub mod reset;
pub mod service;
pub mod shutdown;
pub mod snapshot;
pub mod source;
pub mod status;

pub use config::{Args, Config};
pub use reconciler::{CycleReport, Reconciler, SyncError};
pub use reset::{startup_check, DailyReset, DailySchedule, StartupAction};
pub use service::{OrderService, ServiceError};
pub use shutdown::ShutdownSignal;
pub use snapshot::{Snapshot, ViewProjector};
pub use source::{SourceError, SourceReader, SqlxSource};
pub use status::DerivedStatus;
