//! Inbound event and outbound outcome types.

mod event;
mod outcome;

pub use event::{InvocationEvent, REQUEST_ID_HEADER};
pub use outcome::{Outcome, StatusCode};
