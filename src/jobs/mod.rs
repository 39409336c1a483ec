//! Evaluation job tracking.
//!
//! [`JobRegistry`] keeps at most one polling task per job id. Each tick asks a
//! [`JobSource`] for the job's status and folds it into the shared
//! [`JobStore`]. A terminal status ends polling for that job; `completed`
//! additionally triggers exactly one results fetch.
//!
//! A failed status fetch only ends local observation. The job record keeps
//! whatever status was last seen, since the remote job may still be running.

mod registry;
mod source;
mod store;
mod update;

pub use registry::{JobRegistry, DEFAULT_POLL_INTERVAL, STOPPED_REASON};
pub use source::JobSource;
pub use store::{JobStore, StoreOutcome};
pub use update::JobUpdate;
