use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// Every state change of a pomodoro session produces an Event.
/// The session driver renders them into chat messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        total_sessions: u32,
        study_minutes: u32,
        break_minutes: u32,
        at: DateTime<Utc>,
    },
    BreakStarted {
        session_index: u32,
        break_minutes: u32,
        at: DateTime<Utc>,
    },
    StudyStarted {
        session_index: u32,
        study_minutes: u32,
        at: DateTime<Utc>,
    },
    SessionPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        session_index: u32,
        phase: Phase,
        at: DateTime<Utc>,
    },
    /// The control window closed while the session was paused.
    SessionAbandoned {
        session_index: u32,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        total_sessions: u32,
        studied_minutes: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// True for events that end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::SessionCancelled { .. }
                | Event::SessionAbandoned { .. }
                | Event::SessionCompleted { .. }
        )
    }
}
