mod driver;
mod session;

pub use driver::{
    button_id, parse_button_id, ControlAction, SessionDriver, SessionHandle, SessionRegistry,
    StartedSession, BUTTON_PREFIX,
};
pub use session::{
    describe, Phase, PomodoroSession, SessionSettings, SessionStatus, TickOutcome,
};
