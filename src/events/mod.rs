mod event;
mod handler;
mod registry;
pub mod special;

pub use event::{DispatchError, DispatchOutcome, Event, EventInit, EventPhase};
pub use handler::{Callback, Handler, HandlerList, HandlerSet, Invocation};
pub use registry::Registry;
