// ABOUTME: Step composition - codec and encoder plumbing plus the Step binder
// ABOUTME: that runs one exchange over a transport.

mod codec;
mod runner;

pub use codec::*;
pub use runner::*;
