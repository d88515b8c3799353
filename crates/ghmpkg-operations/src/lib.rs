//! Export, pull and sync operations.
//!
//! Operations are frontend-agnostic: they report progress through the
//! [`EventSink`](ghmpkg_events::EventSink) held by the [`MigrateContext`] and return a
//! [`ReportSummary`] for the caller to render.

pub mod context;
pub mod engine;
pub mod error;
pub mod export;
pub mod progress;
pub mod pull;
pub mod report;
pub mod sync;

pub use context::MigrateContext;
pub use engine::{Direction, TransferEngine};
pub use error::{OperationError, OperationResult};
pub use export::export;
pub use pull::pull;
pub use report::{Report, ReportSummary};
pub use sync::sync;
