//! AnalyzerSim Library
//!
//! Laboratory analyzer simulator: frames ASTM and HL7 messages and runs a
//! background session loop over TCP (client or server) or a serial line,
//! reporting everything it does as session events.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{SimError, SimResult};
pub use domain::config::{ConnectionConfig, ProtocolKind, SessionSettings, SimConfig, TcpRole};
pub use core::protocol::{frame, MessageTemplate};
pub use core::session::{ConnectionIndicator, EventSink, SessionEvent, SessionLoop, SessionState};
