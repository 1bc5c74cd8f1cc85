//! Command façade.
//!
//! [`Bot`] is the only place where platform input meets the core. It
//! validates each interaction, then either writes to the [`Store`] and arms
//! reminders, starts a pomodoro session, or calls the text generator and
//! posts the (possibly chunked) answer. Every failure is turned into a
//! reply to the invoking channel; nothing escapes [`Bot::handle`].
//!
//! All collaborators are injected through [`BotDeps`].

mod attachments;
mod command;

pub use attachments::{AttachmentLoader, HttpAttachmentLoader};
pub use command::{
    Attachment, AttachmentSource, Command, CommandInvocation, ComponentInteraction, Interaction,
    OptionValue, SUBJECT_SELECT_ID,
};

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::ai::{prompts, split_chunks, truncate_chars, TextGenerator};
use crate::dates::{event_instant, format_date};
use crate::error::{ControlError, CoreError, ServiceError, ValidationError};
use crate::pdf::TextExtractor;
use crate::platform::{ChannelId, Component, MessageId, Messenger, OutgoingMessage, UserId};
use crate::reminder::{ReminderScheduler, ReminderSpec};
use crate::storage::{Config, Store};
use crate::timer::{
    parse_button_id, ControlAction, PomodoroSession, SessionDriver, SessionRegistry,
    SessionSettings,
};

pub const INVALID_DATE_REPLY: &str = "❌ Invalid date format. Use dd/mm/yyyy.";
pub const NOT_YOUR_SESSION_REPLY: &str = "🚫 This is not your session.";
pub const SESSION_ENDED_REPLY: &str = "⌛ This session has ended.";

/// Everything the façade talks to.
pub struct BotDeps {
    pub store: Arc<dyn Store>,
    pub messenger: Arc<dyn Messenger>,
    /// `None` when no API key is configured; AI commands then fail politely.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub extractor: Arc<dyn TextExtractor>,
    pub attachments: Arc<dyn AttachmentLoader>,
    /// Reminders may go through a different messenger than replies.
    pub reminders: ReminderScheduler,
}

/// Wording for one AI-backed command.
struct AiReply {
    pending: &'static str,
    heading: &'static str,
    fallback: &'static str,
    failure: &'static str,
}

const SUMMARY: AiReply = AiReply {
    pending: "📄 Processing PDF...",
    heading: "📝 **Summary",
    fallback: "Unable to summarize.",
    failure: "❌ Failed to process file.",
};

const EXPLANATION: AiReply = AiReply {
    pending: "🧠 Thinking...",
    heading: "📚 **Explanation",
    fallback: "Unable to explain.",
    failure: "❌ Failed to generate explanation.",
};

const PLAN: AiReply = AiReply {
    pending: "🗓️ Generating study plan...",
    heading: "🗓️ **Plan",
    fallback: "Unable to generate plan.",
    failure: "❌ Failed to generate plan.",
};

pub struct Bot {
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    generator: Option<Arc<dyn TextGenerator>>,
    extractor: Arc<dyn TextExtractor>,
    attachments: Arc<dyn AttachmentLoader>,
    reminders: ReminderScheduler,
    sessions: SessionDriver,
    config: Config,
}

impl Bot {
    pub fn new(deps: BotDeps, config: Config) -> Self {
        let sessions = SessionDriver::new(Arc::clone(&deps.messenger), SessionRegistry::new());
        Self {
            store: deps.store,
            messenger: deps.messenger,
            generator: deps.generator,
            extractor: deps.extractor,
            attachments: deps.attachments,
            reminders: deps.reminders,
            sessions,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live pomodoro sessions started by this bot.
    pub fn sessions(&self) -> &SessionRegistry {
        self.sessions.registry()
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    /// Handle one interaction, replying in its channel.
    pub async fn handle(&self, interaction: Interaction) {
        match interaction {
            Interaction::Command(invocation) => self.handle_command(invocation).await,
            Interaction::Component(component) => self.handle_component(component).await,
        }
    }

    async fn handle_command(&self, invocation: CommandInvocation) {
        info!(command = %invocation.name, user = %invocation.user, "command received");
        let channel = invocation.channel.clone();
        let parsed = Command::parse(&invocation).and_then(|c| self.check_limits(c));
        let result = match parsed {
            Ok(command) => self.run(command, &invocation).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            self.reply_error(&channel, &e).await;
        }
    }

    /// Reject pomodoro arguments above the configured maximums.
    fn check_limits(&self, command: Command) -> Result<Command, ValidationError> {
        if let Command::Pomodoro {
            study_minutes,
            break_minutes,
            sessions,
        } = &command
        {
            let limits = &self.config.pomodoro;
            for (field, value, max) in [
                ("studytime", *study_minutes, limits.max_study_minutes),
                ("breaktime", *break_minutes, limits.max_break_minutes),
                ("sessioncount", *sessions, limits.max_sessions),
            ] {
                if value > max {
                    return Err(ValidationError::InvalidValue {
                        field: field.into(),
                        message: format!("must be at most {max}"),
                    });
                }
            }
        }
        Ok(command)
    }

    async fn run(&self, command: Command, inv: &CommandInvocation) -> Result<(), CoreError> {
        self.store.ensure_user(&inv.user, &inv.username)?;
        let channel = &inv.channel;
        match command {
            Command::Test => self.reply(channel, "test complete").await,
            Command::Profile => self.profile(channel).await,
            Command::ViewProfile { user } => self.view_profile(channel, &user).await,
            Command::TestAdd {
                subject,
                date,
                portion,
            } => self.add_test(channel, &subject, date, &portion).await,
            Command::TestList => self.list_tests(channel).await,
            Command::Deadline {
                subject,
                work,
                date,
            } => self.add_deadline(channel, &inv.user, &subject, &work, date).await,
            Command::DeadlineList => self.list_deadlines(channel, &inv.user).await,
            Command::Pomodoro {
                study_minutes,
                break_minutes,
                sessions,
            } => {
                let settings = SessionSettings {
                    study_minutes,
                    break_minutes,
                    total_sessions: sessions,
                };
                self.start_pomodoro(channel, &inv.user, settings).await
            }
            Command::Summarize { file } => self.summarize(channel, &file).await,
            Command::Explain { question } => {
                let pending = self.reply_id(channel, EXPLANATION.pending).await?;
                let answer = self
                    .generate(&EXPLANATION, prompts::EXPLAIN_SYSTEM, &prompts::explain(&question))
                    .await;
                self.finish_ai(channel, &pending, &EXPLANATION, answer).await
            }
            Command::ExamPlan => self.exam_plan(channel, &inv.user, &inv.username).await,
        }
    }

    async fn profile(&self, channel: &ChannelId) -> Result<(), CoreError> {
        let subjects = self.config.bot.subjects.clone();
        let menu = Component::Select {
            custom_id: SUBJECT_SELECT_ID.to_string(),
            placeholder: "Select your subjects".to_string(),
            max_values: subjects.len(),
            min_values: 1,
            options: subjects,
        };
        let message = OutgoingMessage::text("Choose your subjects:").with_components(vec![menu]);
        self.messenger.send(channel, message).await?;
        Ok(())
    }

    async fn view_profile(&self, channel: &ChannelId, user: &UserId) -> Result<(), CoreError> {
        let subjects = self.store.get_user_subjects(user)?;
        let text = if subjects.is_empty() {
            format!("{} hasn't created a profile.", user.mention())
        } else {
            let lines: Vec<String> = subjects
                .iter()
                .enumerate()
                .map(|(i, s)| format!("**{}.** {s}", i + 1))
                .collect();
            format!("**{}'s Subject Profile**\n{}", user.mention(), lines.join("\n"))
        };
        self.reply(channel, text).await
    }

    async fn add_test(
        &self,
        channel: &ChannelId,
        subject: &str,
        date: NaiveDate,
        portion: &str,
    ) -> Result<(), CoreError> {
        let subject_id = self.store.find_or_create_subject(subject)?;
        self.store.record_test(subject_id, date, portion)?;
        self.reply(
            channel,
            format!(
                "Test for **{subject}** added on **{}**. Portion: {portion}",
                format_date(date)
            ),
        )
        .await?;

        let mentions = mention_list(&self.store.users_subscribed_to(subject_id)?);
        let mut payload = format!(
            "📢 **{subject}** test on **{}**. Portion: {portion}",
            format_date(date)
        );
        if !mentions.is_empty() {
            payload.push('\n');
            payload.push_str(&mentions);
        }
        let reminders = &self.config.reminders;
        self.reminders.arm(ReminderSpec::with_day_offsets(
            event_instant(date, reminders.event_hour),
            &reminders.test_offsets_days,
            payload,
            channel.clone(),
        ));
        Ok(())
    }

    async fn list_tests(&self, channel: &ChannelId) -> Result<(), CoreError> {
        let tests = self.store.list_tests()?;
        if tests.is_empty() {
            return self.reply(channel, "No upcoming tests found.").await;
        }
        let mut text = String::from("📅 **Upcoming Tests**");
        for (i, test) in tests.iter().enumerate() {
            let mentions = mention_list(&self.store.users_subscribed_to(test.subject_id)?);
            text.push_str(&format!(
                "\n{}. {} – {}\n   **Portion**: {}",
                i + 1,
                test.subject,
                format_date(test.date),
                test.portion
            ));
            if !mentions.is_empty() {
                text.push_str(&format!("\n   {mentions}"));
            }
        }
        self.reply_long(channel, text).await
    }

    async fn add_deadline(
        &self,
        channel: &ChannelId,
        owner: &UserId,
        subject: &str,
        work: &str,
        date: NaiveDate,
    ) -> Result<(), CoreError> {
        let subject_id = self.store.find_or_create_subject(subject)?;
        self.store.record_deadline(subject_id, work, date, owner)?;
        self.reply(
            channel,
            format!(
                "Deadline for **{subject}** added: **{work}** due **{}**.",
                format_date(date)
            ),
        )
        .await?;

        let payload = format!(
            "📌 {} **{work}** for **{subject}** is due on **{}**.",
            owner.mention(),
            format_date(date)
        );
        let reminders = &self.config.reminders;
        self.reminders.arm(ReminderSpec::with_day_offsets(
            event_instant(date, reminders.event_hour),
            &reminders.deadline_offsets_days,
            payload,
            channel.clone(),
        ));
        Ok(())
    }

    async fn list_deadlines(&self, channel: &ChannelId, owner: &UserId) -> Result<(), CoreError> {
        let deadlines = self.store.list_deadlines(owner)?;
        if deadlines.is_empty() {
            return self.reply(channel, "You have no deadlines.").await;
        }
        let mut text = String::from("📌 **Your Deadlines**");
        for (i, d) in deadlines.iter().enumerate() {
            text.push_str(&format!(
                "\n{}. {} – {} (due {})",
                i + 1,
                d.subject,
                d.work,
                format_date(d.date)
            ));
        }
        self.reply_long(channel, text).await
    }

    async fn start_pomodoro(
        &self,
        channel: &ChannelId,
        owner: &UserId,
        settings: SessionSettings,
    ) -> Result<(), CoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = PomodoroSession::new(id, owner.clone(), settings);
        // The task is detached; it ends on its own when the session finishes.
        self.sessions.start(session, channel.clone()).await?;
        Ok(())
    }

    async fn summarize(&self, channel: &ChannelId, file: &Attachment) -> Result<(), CoreError> {
        if !file.is_pdf() {
            return Err(ValidationError::UnsupportedAttachment {
                name: file.name.clone(),
            }
            .into());
        }
        let pending = self.reply_id(channel, SUMMARY.pending).await?;
        let summary = match self.pdf_text(file).await {
            Ok(text) => {
                let text = truncate_chars(&text, self.config.ai.max_pdf_chars);
                self.generate(&SUMMARY, prompts::SUMMARIZE_SYSTEM, text).await
            }
            Err(e) => Err(e),
        };
        self.finish_ai(channel, &pending, &SUMMARY, summary).await
    }

    async fn pdf_text(&self, file: &Attachment) -> Result<String, ServiceError> {
        let bytes = self.attachments.load(file).await?;
        let extractor = Arc::clone(&self.extractor);
        // Parsing is CPU-bound; keep it off the task that ticks sessions.
        tokio::task::spawn_blocking(move || extractor.extract_text(&bytes))
            .await
            .map_err(|e| ServiceError::Extraction(e.to_string()))?
    }

    async fn exam_plan(
        &self,
        channel: &ChannelId,
        user: &UserId,
        username: &str,
    ) -> Result<(), CoreError> {
        let tests = self.store.tests_for_user(user)?;
        if tests.is_empty() {
            return self.reply(channel, "No exams scheduled.").await;
        }
        let prompt = prompts::exam_plan(username, &tests, Local::now().date_naive());
        let pending = self.reply_id(channel, PLAN.pending).await?;
        let plan = self.generate(&PLAN, prompts::PLAN_SYSTEM, &prompt).await;
        self.finish_ai(channel, &pending, &PLAN, plan).await
    }

    async fn generate(
        &self,
        wording: &AiReply,
        system: &str,
        prompt: &str,
    ) -> Result<String, ServiceError> {
        let generator = self.generator.as_ref().ok_or_else(|| ServiceError::NotConfigured {
            what: "AI API key".into(),
        })?;
        match generator.generate(system, prompt).await {
            Err(ServiceError::EmptyResponse) => Ok(wording.fallback.to_string()),
            other => other,
        }
    }

    /// Replace the pending message with the answer, or with the failure text.
    async fn finish_ai(
        &self,
        channel: &ChannelId,
        pending: &MessageId,
        wording: &AiReply,
        answer: Result<String, ServiceError>,
    ) -> Result<(), CoreError> {
        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "text generation failed");
                self.messenger
                    .edit(channel, pending, wording.failure.into())
                    .await?;
                return Ok(());
            }
        };

        if answer.chars().count() <= self.config.messages.max_len {
            let text = format!("{}:**\n{answer}", wording.heading);
            self.messenger.edit(channel, pending, text.into()).await?;
        } else {
            let text = format!("{} too long. Splitting:**", wording.heading);
            self.messenger.edit(channel, pending, text.into()).await?;
            self.send_chunks(channel, &answer).await?;
        }
        Ok(())
    }

    async fn send_chunks(&self, channel: &ChannelId, text: &str) -> Result<(), CoreError> {
        let chunks = split_chunks(text, self.config.messages.chunk_len);
        debug!(chunks = chunks.len(), "sending chunked reply");
        for chunk in chunks {
            self.messenger.send(channel, chunk.into()).await?;
        }
        Ok(())
    }

    async fn handle_component(&self, component: ComponentInteraction) {
        let channel = component.channel.clone();
        let result = if component.custom_id == SUBJECT_SELECT_ID {
            self.save_profile(&component).await
        } else if let Some((session_id, action)) = parse_button_id(&component.custom_id) {
            self.control_session(&component, session_id, action).await
        } else {
            debug!(custom_id = %component.custom_id, "ignoring unknown component");
            Ok(())
        };
        if let Err(e) = result {
            self.reply_error(&channel, &e).await;
        }
    }

    async fn save_profile(&self, component: &ComponentInteraction) -> Result<(), CoreError> {
        if component.values.is_empty() {
            return Err(ValidationError::MissingArgument {
                name: "subjects".into(),
            }
            .into());
        }
        if let Some(unknown) = component
            .values
            .iter()
            .find(|v| !self.config.bot.subjects.contains(v))
        {
            return Err(ValidationError::UnknownSubject {
                name: unknown.clone(),
            }
            .into());
        }

        self.store.ensure_user(&component.user, &component.username)?;
        self.store.set_user_subjects(&component.user, &component.values)?;
        info!(user = %component.user, subjects = component.values.len(), "profile saved");

        let saved = OutgoingMessage::text("✅ Profile saved!");
        match &component.message {
            Some(menu) => self.messenger.edit(&component.channel, menu, saved).await?,
            None => {
                self.messenger.send(&component.channel, saved).await?;
            }
        }
        Ok(())
    }

    async fn control_session(
        &self,
        component: &ComponentInteraction,
        session_id: &str,
        action: ControlAction,
    ) -> Result<(), CoreError> {
        let handle = self
            .sessions
            .registry()
            .get(session_id)
            .ok_or(ControlError::Finished)?;
        // Accepted actions are announced by the session itself.
        handle.control(&component.user, action).await?;
        Ok(())
    }

    async fn reply(&self, channel: &ChannelId, text: impl Into<String>) -> Result<(), CoreError> {
        self.messenger.send(channel, OutgoingMessage::text(text)).await?;
        Ok(())
    }

    async fn reply_id(&self, channel: &ChannelId, text: &str) -> Result<MessageId, CoreError> {
        Ok(self.messenger.send(channel, text.into()).await?)
    }

    /// Send `text`, split into follow-ups when it exceeds the message limit.
    async fn reply_long(&self, channel: &ChannelId, text: String) -> Result<(), CoreError> {
        if text.chars().count() <= self.config.messages.max_len {
            self.reply(channel, text).await
        } else {
            self.send_chunks(channel, &text).await
        }
    }

    async fn reply_error(&self, channel: &ChannelId, err: &CoreError) {
        match err {
            CoreError::Validation(_) | CoreError::Control(_) => {
                debug!(error = %err, "interaction rejected")
            }
            _ => error!(error = %err, "interaction failed"),
        }
        if let Err(e) = self.messenger.send(channel, error_reply(err).into()).await {
            warn!(%channel, error = %e, "failed to deliver error reply");
        }
    }
}

fn mention_list(users: &[UserId]) -> String {
    users
        .iter()
        .map(UserId::mention)
        .collect::<Vec<_>>()
        .join(" ")
}

/// User-visible text for a failed interaction.
pub fn error_reply(err: &CoreError) -> String {
    match err {
        CoreError::Validation(v) => match v {
            ValidationError::InvalidDate { .. } => INVALID_DATE_REPLY.to_string(),
            ValidationError::UnsupportedAttachment { .. } => "Only PDF files supported.".to_string(),
            ValidationError::UnknownCommand { name } => format!("❌ Unknown command `/{name}`."),
            ValidationError::UnknownSubject { name } => format!("❌ Unknown subject: {name}."),
            ValidationError::MissingArgument { name } => format!("❌ Missing option `{name}`."),
            ValidationError::WrongArgumentType { name, expected } => {
                format!("❌ Option `{name}` must be {expected}.")
            }
            ValidationError::InvalidValue { field, message } => {
                format!("❌ Option `{field}` {message}.")
            }
        },
        CoreError::Control(c) => match c {
            ControlError::Unauthorized(_) => NOT_YOUR_SESSION_REPLY.to_string(),
            ControlError::AlreadyPaused => "⏸️ The timer is already paused.".to_string(),
            ControlError::NotPaused => "▶️ The timer is not paused.".to_string(),
            ControlError::Finished => SESSION_ENDED_REPLY.to_string(),
        },
        CoreError::Service(_) => "❌ The AI service is unavailable. Please try again.".to_string(),
        _ => "❌ Something went wrong. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthorizationError;

    #[test]
    fn date_errors_use_the_format_hint() {
        let err: CoreError = ValidationError::InvalidDate {
            input: "31/02/2027".into(),
        }
        .into();
        assert_eq!(error_reply(&err), INVALID_DATE_REPLY);
    }

    #[test]
    fn strangers_are_told_it_is_not_their_session() {
        let err: CoreError = AuthorizationError::NotSessionOwner {
            actor: "2".into(),
            owner: "1".into(),
        }
        .into();
        assert_eq!(error_reply(&err), NOT_YOUR_SESSION_REPLY);
    }

    #[test]
    fn mentions_are_space_separated() {
        let users = [UserId::new("1"), UserId::new("2")];
        assert_eq!(mention_list(&users), "<@1> <@2>");
        assert_eq!(mention_list(&[]), "");
    }
}
