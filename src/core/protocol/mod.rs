// Protocol module - Outbound framing and control characters
pub mod control;
pub mod framing;

pub use framing::{auto_ack_payload, frame, MessageTemplate};
