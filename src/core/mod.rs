// Core module - Protocol framing and the session loop
pub mod protocol;
pub mod session;
