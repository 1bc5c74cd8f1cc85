//! # Studyroom Core Library
//!
//! Core logic for a study-group chat bot. Hosts (the `studyroom` CLI, or a
//! chat gateway) feed [`Interaction`]s into a [`Bot`] and provide a
//! [`Messenger`] to talk back through.
//!
//! ## Architecture
//!
//! - **Timer**: a pomodoro state machine ticked once per second by a
//!   per-session tokio task, with owner-only pause/resume/cancel
//! - **Reminders**: fire-once, in-memory timers for tests and deadlines
//! - **Storage**: SQLite persistence behind the [`Store`] trait and TOML
//!   configuration
//! - **AI / PDF**: text generation and PDF extraction behind traits
//! - **Bot**: the command façade that validates input and ties it all together
//!
//! ## Key Components
//!
//! - [`PomodoroSession`]: session state machine
//! - [`SessionDriver`]: runs sessions against a channel
//! - [`ReminderScheduler`]: arms reminder timers
//! - [`Database`]: canonical [`Store`] implementation
//! - [`Bot`]: command façade

pub mod ai;
pub mod bot;
pub mod dates;
pub mod error;
pub mod events;
pub mod integrations;
pub mod pdf;
pub mod platform;
pub mod reminder;
pub mod storage;
pub mod timer;

pub use ai::{GroqClient, TextGenerator};
pub use bot::{Bot, BotDeps, Command, CommandInvocation, Interaction, OptionValue};
pub use error::{
    AuthorizationError, ConfigError, ControlError, CoreError, DatabaseError, DeliveryError,
    ServiceError, ValidationError,
};
pub use events::Event;
pub use pdf::{LopdfExtractor, TextExtractor};
pub use platform::{ChannelId, MessageId, Messenger, OutgoingMessage, UserId};
pub use reminder::{ReminderScheduler, ReminderSpec};
pub use storage::{Config, Database, Store};
pub use timer::{Phase, PomodoroSession, SessionDriver, SessionRegistry, SessionSettings};
