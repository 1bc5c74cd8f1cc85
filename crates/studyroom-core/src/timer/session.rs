//! Pomodoro session state machine.
//!
//! A session alternates study and break phases for a fixed number of
//! rounds. It has no internal timer: the caller invokes [`PomodoroSession::tick`]
//! once per second (see [`super::driver`]).
//!
//! ## State Transitions
//!
//! ```text
//! Study -> Break -> Study -> ... -> Break -> Complete
//!   \________\________________________\____> Cancelled
//! ```
//!
//! Pause only freezes the countdown; it is a flag, not a phase. A session
//! still paused when its controls expire is abandoned into `Cancelled`.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dates::{format_countdown, format_minutes};
use crate::error::{AuthorizationError, ControlError};
use crate::events::Event;
use crate::platform::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Study,
    Break,
    Complete,
    Cancelled,
}

impl Phase {
    pub fn is_finished(self) -> bool {
        matches!(self, Phase::Complete | Phase::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Study => "📚 Study",
            Phase::Break => "☕ Break",
            Phase::Complete => "✅ Complete",
            Phase::Cancelled => "🛑 Cancelled",
        }
    }
}

/// Durations a session was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub study_minutes: u32,
    pub break_minutes: u32,
    pub total_sessions: u32,
}

impl SessionSettings {
    /// How long control buttons stay live: `(study + break) * sessions` minutes.
    pub fn control_window(&self) -> Duration {
        let minutes = (u64::from(self.study_minutes) + u64::from(self.break_minutes))
            .saturating_mul(u64::from(self.total_sessions));
        Duration::from_secs(minutes.saturating_mul(60))
    }

    pub fn studied_minutes(&self) -> u64 {
        u64::from(self.study_minutes) * u64::from(self.total_sessions)
    }

    fn study_secs(&self) -> u64 {
        u64::from(self.study_minutes) * 60
    }

    fn break_secs(&self) -> u64 {
        u64::from(self.break_minutes) * 60
    }
}

/// Point-in-time view used for the status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_index: u32,
    pub total_sessions: u32,
    pub phase: Phase,
    pub remaining_secs: u64,
    pub paused: bool,
}

impl SessionStatus {
    pub fn render(&self) -> String {
        let mut out = format!(
            "**Session {}/{}** – {}\n⏳ {} remaining",
            self.session_index,
            self.total_sessions,
            self.phase.label(),
            format_countdown(self.remaining_secs)
        );
        if self.paused {
            out.push_str(" (paused)");
        }
        out
    }
}

/// Result of one tick: the status to render and an optional phase notice.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Status captured after the decrement, before any phase change.
    pub status: SessionStatus,
    pub notice: Option<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroSession {
    id: String,
    owner: UserId,
    settings: SessionSettings,
    /// 1-based.
    session_index: u32,
    phase: Phase,
    remaining_secs: u64,
    paused: bool,
}

impl PomodoroSession {
    /// New session in `Study`, round 1, with the full study time remaining.
    pub fn new(id: impl Into<String>, owner: UserId, settings: SessionSettings) -> Self {
        Self {
            id: id.into(),
            owner,
            settings,
            session_index: 1,
            phase: Phase::Study,
            remaining_secs: settings.study_secs(),
            paused: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn session_index(&self) -> u32 {
        self.session_index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_index: self.session_index,
            total_sessions: self.settings.total_sessions,
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            paused: self.paused,
        }
    }

    pub fn started_event(&self) -> Event {
        Event::SessionStarted {
            total_sessions: self.settings.total_sessions,
            study_minutes: self.settings.study_minutes,
            break_minutes: self.settings.break_minutes,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Advance the countdown by one second.
    ///
    /// Returns `None` while paused or after the session has finished; such
    /// ticks change nothing.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        if self.paused || self.is_finished() {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        let status = self.status();

        let notice = if self.remaining_secs == 0 {
            Some(self.advance())
        } else {
            None
        };

        Some(TickOutcome { status, notice })
    }

    pub fn pause(&mut self, actor: &UserId) -> Result<Event, ControlError> {
        self.authorize(actor)?;
        if self.is_finished() {
            return Err(ControlError::Finished);
        }
        if self.paused {
            return Err(ControlError::AlreadyPaused);
        }
        self.paused = true;
        Ok(Event::SessionPaused {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self, actor: &UserId) -> Result<Event, ControlError> {
        self.authorize(actor)?;
        if self.is_finished() {
            return Err(ControlError::Finished);
        }
        if !self.paused {
            return Err(ControlError::NotPaused);
        }
        self.paused = false;
        Ok(Event::SessionResumed {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Valid at any time before the session finishes, paused or not.
    pub fn cancel(&mut self, actor: &UserId) -> Result<Event, ControlError> {
        self.authorize(actor)?;
        if self.is_finished() {
            return Err(ControlError::Finished);
        }
        let phase = self.phase;
        self.phase = Phase::Cancelled;
        self.paused = false;
        Ok(Event::SessionCancelled {
            session_index: self.session_index,
            phase,
            at: Utc::now(),
        })
    }

    /// End a paused session nobody can resume any more.
    ///
    /// Returns `None` when the session is running or already finished; a
    /// running session still reaches `Complete` on its own.
    pub fn abandon(&mut self) -> Option<Event> {
        if !self.paused || self.is_finished() {
            return None;
        }
        self.phase = Phase::Cancelled;
        self.paused = false;
        Some(Event::SessionAbandoned {
            session_index: self.session_index,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn authorize(&self, actor: &UserId) -> Result<(), AuthorizationError> {
        if *actor != self.owner {
            return Err(AuthorizationError::NotSessionOwner {
                actor: actor.to_string(),
                owner: self.owner.to_string(),
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> Event {
        match self.phase {
            Phase::Study => {
                self.phase = Phase::Break;
                self.remaining_secs = self.settings.break_secs();
                Event::BreakStarted {
                    session_index: self.session_index,
                    break_minutes: self.settings.break_minutes,
                    at: Utc::now(),
                }
            }
            Phase::Break if self.session_index >= self.settings.total_sessions => {
                self.phase = Phase::Complete;
                Event::SessionCompleted {
                    total_sessions: self.settings.total_sessions,
                    studied_minutes: self.settings.studied_minutes(),
                    at: Utc::now(),
                }
            }
            Phase::Break => {
                self.session_index += 1;
                self.phase = Phase::Study;
                self.remaining_secs = self.settings.study_secs();
                Event::StudyStarted {
                    session_index: self.session_index,
                    study_minutes: self.settings.study_minutes,
                    at: Utc::now(),
                }
            }
            // Unreachable through tick(), which returns early for finished phases.
            Phase::Complete | Phase::Cancelled => Event::SessionCompleted {
                total_sessions: self.settings.total_sessions,
                studied_minutes: self.settings.studied_minutes(),
                at: Utc::now(),
            },
        }
    }
}

/// Chat text for a session event.
pub fn describe(event: &Event) -> String {
    match event {
        Event::SessionStarted {
            total_sessions,
            study_minutes,
            break_minutes,
            ..
        } => format!(
            "🍅 Pomodoro started: {total_sessions} × {study_minutes} min study / {break_minutes} min break."
        ),
        Event::BreakStarted {
            session_index,
            break_minutes,
            ..
        } => format!("☕ Session {session_index} done! Take a {break_minutes} minute break."),
        Event::StudyStarted {
            session_index,
            study_minutes,
            ..
        } => format!("📚 Break over! Session {session_index} started: study for {study_minutes} minutes."),
        Event::SessionPaused { .. } => "⏸️ Timer paused.".to_string(),
        Event::SessionResumed { .. } => "▶️ Timer resumed.".to_string(),
        Event::SessionCancelled { .. } => "🛑 Pomodoro session cancelled.".to_string(),
        Event::SessionAbandoned { remaining_secs, .. } => format!(
            "⌛ Pomodoro session ended: it was still paused with {} left when its controls expired.",
            format_countdown(*remaining_secs)
        ),
        Event::SessionCompleted {
            total_sessions,
            studied_minutes,
            ..
        } => format!(
            "🎉 All {total_sessions} sessions complete! You studied for {}.",
            format_minutes(*studied_minutes)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(study: u32, brk: u32, sessions: u32) -> SessionSettings {
        SessionSettings {
            study_minutes: study,
            break_minutes: brk,
            total_sessions: sessions,
        }
    }

    fn owner() -> UserId {
        UserId::new("owner")
    }

    #[test]
    fn starts_in_study_round_one() {
        let s = PomodoroSession::new("s1", owner(), settings(25, 5, 4));
        assert_eq!(s.phase(), Phase::Study);
        assert_eq!(s.session_index(), 1);
        assert_eq!(s.remaining_secs(), 25 * 60);
        assert!(!s.is_paused());
    }

    #[test]
    fn full_cycle_emits_one_notice_per_transition() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 2));
        let mut notices = Vec::new();
        let mut ticks = 0;
        while let Some(outcome) = s.tick() {
            ticks += 1;
            assert!(outcome.status.remaining_secs < 60);
            if let Some(n) = outcome.notice {
                notices.push(n);
            }
            assert!(ticks <= 240, "session did not finish");
        }

        assert_eq!(ticks, 240);
        assert_eq!(s.phase(), Phase::Complete);
        assert_eq!(notices.len(), 4);
        assert!(matches!(notices[0], Event::BreakStarted { session_index: 1, .. }));
        assert!(matches!(notices[1], Event::StudyStarted { session_index: 2, .. }));
        assert!(matches!(notices[2], Event::BreakStarted { session_index: 2, .. }));
        assert!(matches!(
            notices[3],
            Event::SessionCompleted {
                studied_minutes: 2,
                ..
            }
        ));
    }

    #[test]
    fn index_stays_within_bounds_while_active() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 3));
        while s.tick().is_some() {
            if !s.is_finished() {
                assert!((1..=3).contains(&s.session_index()));
            }
        }
        assert_eq!(s.session_index(), 3);
    }

    #[test]
    fn paused_ticks_do_nothing() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 1));
        s.tick();
        s.pause(&owner()).unwrap();
        for _ in 0..10 {
            assert!(s.tick().is_none());
        }
        assert_eq!(s.remaining_secs(), 59);
        s.resume(&owner()).unwrap();
        s.tick();
        assert_eq!(s.remaining_secs(), 58);
    }

    #[test]
    fn pause_and_resume_validate_state() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 1));
        assert_eq!(s.resume(&owner()), Err(ControlError::NotPaused));
        s.pause(&owner()).unwrap();
        assert_eq!(s.pause(&owner()), Err(ControlError::AlreadyPaused));
    }

    #[test]
    fn cancel_freezes_session() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 1));
        s.tick();
        let event = s.cancel(&owner()).unwrap();
        assert!(event.is_terminal());
        assert_eq!(s.phase(), Phase::Cancelled);
        assert!(s.tick().is_none());
        assert_eq!(s.remaining_secs(), 59);
        assert_eq!(s.cancel(&owner()), Err(ControlError::Finished));
        assert_eq!(s.pause(&owner()), Err(ControlError::Finished));
    }

    #[test]
    fn cancel_while_paused_is_allowed() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 1));
        s.pause(&owner()).unwrap();
        assert!(s.cancel(&owner()).is_ok());
        assert_eq!(s.phase(), Phase::Cancelled);
    }

    #[test]
    fn abandon_only_ends_paused_sessions() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 1));
        s.tick();
        assert!(s.abandon().is_none());
        assert_eq!(s.phase(), Phase::Study);

        s.pause(&owner()).unwrap();
        let event = s.abandon().unwrap();
        assert!(event.is_terminal());
        assert!(matches!(event, Event::SessionAbandoned { session_index: 1, remaining_secs: 59, .. }));
        assert_eq!(s.phase(), Phase::Cancelled);
        assert!(s.tick().is_none());
        assert!(s.abandon().is_none());
        assert_eq!(describe(&event), "⌛ Pomodoro session ended: it was still paused with 00:59 left when its controls expired.");
    }

    #[test]
    fn strangers_cannot_control() {
        let mut s = PomodoroSession::new("s1", owner(), settings(1, 1, 1));
        s.tick();
        let stranger = UserId::new("stranger");
        for result in [s.pause(&stranger), s.resume(&stranger), s.cancel(&stranger)] {
            assert!(matches!(result, Err(ControlError::Unauthorized(_))));
        }
        assert_eq!(s.phase(), Phase::Study);
        assert_eq!(s.remaining_secs(), 59);
        assert!(!s.is_paused());
    }

    #[test]
    fn completion_summary_uses_hours_past_an_hour() {
        let event = Event::SessionCompleted {
            total_sessions: 4,
            studied_minutes: 100,
            at: Utc::now(),
        };
        assert!(describe(&event).contains("1h 40m"));
    }

    #[test]
    fn control_window_covers_all_rounds() {
        assert_eq!(
            settings(25, 5, 4).control_window(),
            Duration::from_secs(120 * 60)
        );
    }

    #[test]
    fn status_render_shows_countdown() {
        let s = PomodoroSession::new("s1", owner(), settings(25, 5, 4));
        let text = s.status().render();
        assert!(text.contains("Session 1/4"));
        assert!(text.contains("25:00"));
    }
}
