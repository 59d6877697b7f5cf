//! WebSocket signaling transport

mod ws;

pub use ws::SignalingTransport;
