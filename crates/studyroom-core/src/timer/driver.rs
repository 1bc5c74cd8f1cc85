//! Runs a [`PomodoroSession`] against a chat channel.
//!
//! Each session lives inside exactly one tokio task that owns it. The task
//! waits on three things at once: the 1-second tick interval, control
//! requests from the session's buttons, and the expiry of the control
//! window. Nothing outside the task touches the session; control requests
//! reach it over an mpsc channel and get their answer back on a oneshot.
//!
//! The task ends when the session completes, is cancelled, or is still
//! paused when the control window closes. Ending drops
//! the interval and the control receiver and removes the registry entry,
//! so no timer outlives its session.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::session::{describe, PomodoroSession, SessionStatus};
use crate::error::{ControlError, DeliveryError};
use crate::events::Event;
use crate::platform::{ChannelId, Component, MessageId, Messenger, OutgoingMessage, UserId};

const TICK: Duration = Duration::from_secs(1);
const CONTROL_QUEUE: usize = 16;

/// Prefix of button custom ids: `pomodoro:<session id>:<action>`.
pub const BUTTON_PREFIX: &str = "pomodoro";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ControlAction::Pause => "⏸️ Pause",
            ControlAction::Resume => "▶️ Resume",
            ControlAction::Cancel => "🛑 Cancel",
        }
    }
}

impl FromStr for ControlAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(ControlAction::Pause),
            "resume" => Ok(ControlAction::Resume),
            "cancel" => Ok(ControlAction::Cancel),
            _ => Err(()),
        }
    }
}

/// Button custom id for a session action.
pub fn button_id(session_id: &str, action: ControlAction) -> String {
    format!("{BUTTON_PREFIX}:{session_id}:{}", action.as_str())
}

/// Split a button custom id into session id and action.
pub fn parse_button_id(custom_id: &str) -> Option<(&str, ControlAction)> {
    let rest = custom_id.strip_prefix(BUTTON_PREFIX)?.strip_prefix(':')?;
    let (session_id, action) = rest.rsplit_once(':')?;
    Some((session_id, action.parse().ok()?))
}

fn control_buttons(session_id: &str) -> Vec<Component> {
    [ControlAction::Pause, ControlAction::Resume, ControlAction::Cancel]
        .into_iter()
        .map(|action| Component::Button {
            custom_id: button_id(session_id, action),
            label: action.label().to_string(),
        })
        .collect()
}

struct ControlRequest {
    actor: UserId,
    action: ControlAction,
    reply: oneshot::Sender<Result<Event, ControlError>>,
}

/// Cloneable sender side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    owner: UserId,
    tx: mpsc::Sender<ControlRequest>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Ask the session task to apply `action` on behalf of `actor`.
    pub async fn control(
        &self,
        actor: &UserId,
        action: ControlAction,
    ) -> Result<Event, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest {
                actor: actor.clone(),
                action,
                reply,
            })
            .await
            .map_err(|_| ControlError::Finished)?;
        rx.await.map_err(|_| ControlError::Finished)?
    }
}

/// Sessions whose controls are still live, by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    next_seq: u64,
    /// Insertion sequence alongside each handle, for `latest_for`.
    sessions: HashMap<String, (u64, SessionHandle)>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.lock().sessions.get(id).map(|(_, h)| h.clone())
    }

    /// Most recently started live session owned by `owner`, if any.
    pub fn latest_for(&self, owner: &UserId) -> Option<SessionHandle> {
        self.lock()
            .sessions
            .values()
            .filter(|(_, h)| h.owner == *owner)
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, h)| h.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, handle: SessionHandle) {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.insert(handle.id.clone(), (seq, handle));
    }

    fn remove(&self, id: &str) {
        self.lock().sessions.remove(id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // A poisoned map still holds valid handles.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A session that has been started; `task` yields the final session state.
pub struct StartedSession {
    pub handle: SessionHandle,
    pub task: JoinHandle<PomodoroSession>,
}

/// Starts sessions and wires them to a messenger and the registry.
#[derive(Clone)]
pub struct SessionDriver {
    messenger: Arc<dyn Messenger>,
    registry: SessionRegistry,
}

impl SessionDriver {
    pub fn new(messenger: Arc<dyn Messenger>, registry: SessionRegistry) -> Self {
        Self {
            messenger,
            registry,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Post the start notice and status message, then spawn the session task.
    pub async fn start(
        &self,
        session: PomodoroSession,
        channel: ChannelId,
    ) -> Result<StartedSession, DeliveryError> {
        let id = session.id().to_string();

        self.messenger
            .send(&channel, describe(&session.started_event()).into())
            .await?;
        let status_id = self
            .messenger
            .send(&channel, status_message(&id, session.status(), true))
            .await?;

        let (tx, rx) = mpsc::channel(CONTROL_QUEUE);
        let handle = SessionHandle {
            id: id.clone(),
            owner: session.owner().clone(),
            tx,
        };
        self.registry.insert(handle.clone());

        info!(
            session_id = %id,
            owner = %session.owner(),
            study_minutes = session.settings().study_minutes,
            break_minutes = session.settings().break_minutes,
            total_sessions = session.settings().total_sessions,
            "pomodoro session started"
        );

        let run = SessionRun {
            messenger: Arc::clone(&self.messenger),
            registry: self.registry.clone(),
            channel,
            status_message: status_id,
        };
        let task = tokio::spawn(run.drive(session, rx));

        Ok(StartedSession { handle, task })
    }
}

fn status_message(session_id: &str, status: SessionStatus, controls: bool) -> OutgoingMessage {
    let message = OutgoingMessage::text(status.render());
    if controls {
        message.with_components(control_buttons(session_id))
    } else {
        message
    }
}

struct SessionRun {
    messenger: Arc<dyn Messenger>,
    registry: SessionRegistry,
    channel: ChannelId,
    status_message: MessageId,
}

impl SessionRun {
    async fn drive(
        self,
        mut session: PomodoroSession,
        mut rx: mpsc::Receiver<ControlRequest>,
    ) -> PomodoroSession {
        let id = session.id().to_string();
        let expiry = tokio::time::sleep(session.settings().control_window());
        tokio::pin!(expiry);

        let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut controls_open = true;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Some(outcome) = session.tick() else { continue };
                    self.render(&id, outcome.status, controls_open).await;
                    if let Some(notice) = outcome.notice {
                        debug!(session_id = %id, ?notice, "phase change");
                        self.notify(&notice).await;
                        if notice.is_terminal() {
                            info!(session_id = %id, "pomodoro session complete");
                            break;
                        }
                    }
                }
                Some(request) = rx.recv(), if controls_open => {
                    let result = match request.action {
                        ControlAction::Pause => session.pause(&request.actor),
                        ControlAction::Resume => session.resume(&request.actor),
                        ControlAction::Cancel => session.cancel(&request.actor),
                    };
                    let terminal = match &result {
                        Ok(event) => {
                            info!(session_id = %id, action = request.action.as_str(), "session control applied");
                            self.render(&id, session.status(), !event.is_terminal()).await;
                            self.notify(event).await;
                            event.is_terminal()
                        }
                        Err(e) => {
                            debug!(session_id = %id, actor = %request.actor, error = %e, "session control rejected");
                            false
                        }
                    };
                    // The requester may have given up waiting.
                    let _ = request.reply.send(result);
                    if terminal {
                        break;
                    }
                }
                _ = &mut expiry, if controls_open => {
                    controls_open = false;
                    self.registry.remove(&id);
                    rx.close();
                    info!(session_id = %id, "session controls expired");
                    self.render(&id, session.status(), false).await;
                    // Nobody can resume it now.
                    if let Some(event) = session.abandon() {
                        info!(session_id = %id, "paused session abandoned");
                        self.notify(&event).await;
                        break;
                    }
                }
            }
        }

        self.registry.remove(&id);
        if controls_open {
            self.render(&id, session.status(), false).await;
        }
        session
    }

    async fn render(&self, id: &str, status: SessionStatus, controls: bool) {
        if let Err(e) = self
            .messenger
            .edit(&self.channel, &self.status_message, status_message(id, status, controls))
            .await
        {
            warn!(session_id = %id, error = %e, "failed to update session status");
        }
    }

    async fn notify(&self, event: &Event) {
        if let Err(e) = self.messenger.send(&self.channel, describe(event).into()).await {
            warn!(error = %e, "failed to send session notice");
        }
    }
}
