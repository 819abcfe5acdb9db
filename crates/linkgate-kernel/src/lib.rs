//! linkgate host runtime.
//!
//! The host side of the integration contracts:
//!
//! - **[`registry`]** -- [`IntegrationRegistry`], which holds each adapter's
//!   authorization provider and event bridge keyed by adapter id.
//! - **[`scheduler`]** -- [`PollScheduler`], which serializes polls per
//!   callback id and drives periodic poll loops.
//! - **[`error`]** -- [`KernelError`], wrapping integration failures without
//!   losing their classification.
//!
//! All public types are `Send + Sync` and intended for a multi-threaded
//! tokio runtime.

pub mod error;
pub mod registry;
pub mod scheduler;

pub use error::{KernelError, Result};
pub use registry::{IntegrationInfo, IntegrationRegistry};
pub use scheduler::{PollBatch, PollScheduler, ScheduledPoll};
