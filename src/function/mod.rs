//! Streaming handlers and the wrapper that runs them.

pub mod gate;
pub mod handler;
pub mod registry;
pub mod wrapper;

pub use gate::{CompletionGate, Signal};
pub use handler::{CompletionCallback, InvocationContext, StreamingHandler};
pub use registry::HandlerRegistry;
pub use wrapper::HandlerWrapper;
