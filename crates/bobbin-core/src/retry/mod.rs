//! Retry controller.
//!
//! [`RetryOperation`] re-invokes an operation with exponential backoff until it
//! reports success, the attempt budget runs out, or `max_elapsed` passes.
//! It can be driven callback-style through [`RetryOperation::attempt`] and
//! [`RetryOperation::retry`], or as a future through [`RetryOperation::run`].

mod error;
mod operation;
mod policy;
mod run;
mod state;

pub use error::{RetryError, RetryFailure};
pub use operation::RetryOperation;
pub use policy::RetryPolicy;
pub use state::RetryState;
