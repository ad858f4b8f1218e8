//! Cooperative cancellation.
//!
//! A single [`CancellationToken`] is created per run. The executor cancels it
//! on the first stage failure; the CLI cancels it on Ctrl-C.

mod token;

pub use token::CancellationToken;
