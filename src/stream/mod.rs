// ABOUTME: Streaming module - the delta engine shared by every provider and
// ABOUTME: the pull-based StepStream that drives provider chunk mappers.

mod decode;
mod event;
mod state;

pub use decode::*;
pub use event::*;
pub use state::*;

#[cfg(test)]
mod state_test;
