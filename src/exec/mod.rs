//! Command execution: process spawning, output capture, throttled progress
//! delivery, and two-phase termination.

pub mod executor;
pub mod request;
pub mod terminate;
pub mod throttle;

pub use executor::execute;
pub use request::{ExecRequest, ExecResult};
pub use terminate::{terminate_child, CancellationController, TerminationKind};
pub use throttle::spawn_throttler;
