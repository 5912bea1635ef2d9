// Session module - Background session loop and its event model
pub mod event;
pub mod session_loop;
pub mod state;

pub use event::{ConnectionIndicator, EventSink, SessionEvent};
pub use session_loop::SessionLoop;
pub use state::{SessionState, SessionStatistics};
