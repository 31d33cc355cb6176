//! Asynchronous command tracking for cmdwatch.
//!
//! Launches long-running commands on the job-launching service and
//! delivers each command's terminal outcome exactly once, even though
//! completion can be noticed through two unreliable channels:
//!
//! - [`PushListener`] reacts to `CommandChanged` notifications on the
//!   event bus;
//! - [`Watchdog`] re-polls every pending command on a fixed period.
//!
//! Both funnel into [`ResultFetcher`], which removes an entry from the
//! [`PendingRegistry`] before running its callbacks, so overlapping polls
//! of the same command cannot dispatch it twice. [`CommandTracker`] owns
//! the whole arrangement and ties it to one cancellation token.

pub mod api;
pub mod config;
pub mod fetcher;
pub mod issuer;
pub mod listener;
pub mod registry;
pub mod tracker;
pub mod watchdog;

pub use api::{HttpJobService, JobService, JobServiceError};
pub use config::{ConfigError, TrackerConfig};
pub use fetcher::{FetchOutcome, PollError, ResultFetcher};
pub use issuer::{CommandHandle, CommandIssuer, LaunchError, Launched};
pub use listener::PushListener;
pub use registry::{CommandOutcome, PendingEntry, PendingRegistry, RegistryClosed};
pub use tracker::CommandTracker;
pub use watchdog::Watchdog;
