//! Session controller: the signaling state machine
//!
//! One [`SessionController`] per peer relationship. It is created when the
//! signaling transport opens and destroyed when the transport closes or a
//! fatal error occurs; see the crate docs for the event flow.

mod controller;
mod events;

pub use controller::{NegotiationStep, SessionController, SessionState};
pub use events::SessionEvent;
