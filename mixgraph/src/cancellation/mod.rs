//! Cooperative cancellation for streaming tasks.

mod token;

pub use token::CancellationToken;
