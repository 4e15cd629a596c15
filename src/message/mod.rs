// ABOUTME: Message module - the canonical, provider-independent data model.
// ABOUTME: Content algebra, messages, deltas, extra namespaces, validation.

mod content;
mod extra;
mod types;
mod validate;

pub use content::*;
pub use extra::*;
pub use types::*;
pub use validate::*;
