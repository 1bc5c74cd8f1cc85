//! Integration tests for the command façade.
//!
//! Wires a [`Bot`] to an in-memory database, a recording messenger and a
//! scripted text generator, then drives it through whole interactions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use studyroom_core::bot::{
    Attachment, AttachmentSource, ComponentInteraction, HttpAttachmentLoader, INVALID_DATE_REPLY,
    NOT_YOUR_SESSION_REPLY, SESSION_ENDED_REPLY, SUBJECT_SELECT_ID,
};
use studyroom_core::dates::format_date;
use studyroom_core::error::ServiceError;
use studyroom_core::integrations::RecordingMessenger;
use studyroom_core::platform::Component;
use studyroom_core::timer::{button_id, ControlAction};
use studyroom_core::{
    Bot, BotDeps, ChannelId, CommandInvocation, Config, Database, Interaction, OptionValue,
    ReminderScheduler, Store, TextExtractor, TextGenerator, UserId,
};

struct ScriptedGenerator {
    answer: Result<String, ()>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone().map_err(|_| ServiceError::Status {
            status: 500,
            body: "boom".into(),
        })
    }
}

struct FixedText(String);

impl TextExtractor for FixedText {
    fn extract_text(&self, _bytes: &[u8]) -> Result<String, ServiceError> {
        Ok(self.0.clone())
    }
}

/// Blocks its thread until something else on the runtime signals it.
struct GatedText {
    gate: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl TextExtractor for GatedText {
    fn extract_text(&self, _bytes: &[u8]) -> Result<String, ServiceError> {
        self.gate
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .map(|()| "gated notes".to_string())
            .map_err(|e| ServiceError::Extraction(e.to_string()))
    }
}

struct Harness {
    bot: Bot,
    messenger: Arc<RecordingMessenger>,
    store: Arc<Database>,
    generator: Arc<ScriptedGenerator>,
}

impl Harness {
    fn new(answer: Result<&str, ()>) -> Self {
        Self::with_generator(answer, true)
    }

    fn with_generator(answer: Result<&str, ()>, configured: bool) -> Self {
        Self::build(answer, configured, Arc::new(FixedText("x".repeat(20_000))))
    }

    fn build(
        answer: Result<&str, ()>,
        configured: bool,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let messenger = Arc::new(RecordingMessenger::new());
        let store = Arc::new(Database::open_memory().unwrap());
        let generator = Arc::new(ScriptedGenerator {
            answer: answer.map(String::from),
            prompts: Mutex::new(Vec::new()),
        });
        let deps = BotDeps {
            store: store.clone(),
            messenger: messenger.clone(),
            generator: configured.then(|| generator.clone() as Arc<dyn TextGenerator>),
            extractor,
            attachments: Arc::new(HttpAttachmentLoader::new(5).unwrap()),
            reminders: ReminderScheduler::new(messenger.clone()),
        };
        Self {
            bot: Bot::new(deps, Config::default()),
            messenger,
            store,
            generator,
        }
    }

    async fn command(&self, user: &str, name: &str, options: &[(&str, &str)]) {
        let invocation = options.iter().fold(
            CommandInvocation::new(name, UserId::new(user), user, channel()),
            |inv, (k, v)| inv.option(*k, OptionValue::String(v.to_string())),
        );
        self.bot.handle(Interaction::Command(invocation)).await;
    }

    async fn component(&self, user: &str, custom_id: &str, values: &[&str]) {
        self.bot
            .handle(Interaction::Component(ComponentInteraction {
                custom_id: custom_id.to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
                user: UserId::new(user),
                username: user.to_string(),
                channel: channel(),
                message: None,
            }))
            .await;
    }

    fn replies(&self) -> Vec<String> {
        self.messenger.contents(&channel())
    }

    fn last_reply(&self) -> String {
        self.replies().pop().unwrap_or_default()
    }
}

fn channel() -> ChannelId {
    ChannelId::new("study-hall")
}

fn days_from_today(days: i64) -> String {
    format_date(Local::now().date_naive() + chrono::Duration::days(days))
}

#[tokio::test]
async fn test_invalid_date_mutates_nothing() {
    let h = Harness::new(Ok("unused"));
    for date in ["31/02/2027", "2027-05-02", "1/1/27", "aa/bb/cccc"] {
        h.command(
            "1",
            "test-add",
            &[("subject", "IB Physics"), ("date", date), ("portion", "Waves")],
        )
        .await;
        assert_eq!(h.last_reply(), INVALID_DATE_REPLY);
    }
    assert!(h.store.list_tests().unwrap().is_empty());
    assert_eq!(h.bot.reminders().pending(), 0);
}

#[tokio::test]
async fn test_add_test_arms_reminders_and_lists_subscribers() {
    let h = Harness::new(Ok("unused"));
    h.component("7", SUBJECT_SELECT_ID, &["IB Physics"]).await;
    assert_eq!(h.last_reply(), "✅ Profile saved!");

    let date = days_from_today(30);
    h.command(
        "1",
        "test-add",
        &[("subject", "IB Physics"), ("date", &date), ("portion", "Waves")],
    )
    .await;
    assert_eq!(
        h.last_reply(),
        format!("Test for **IB Physics** added on **{date}**. Portion: Waves")
    );
    assert_eq!(h.bot.reminders().pending(), 5);

    h.command("1", "test-list", &[]).await;
    let listing = h.last_reply();
    assert!(listing.starts_with("📅 **Upcoming Tests**"));
    assert!(listing.contains(&format!("1. IB Physics – {date}")));
    assert!(listing.contains("**Portion**: Waves"));
    assert!(listing.contains("<@7>"));
}

#[tokio::test]
async fn test_empty_lists() {
    let h = Harness::new(Ok("unused"));
    h.command("1", "test-list", &[]).await;
    assert_eq!(h.last_reply(), "No upcoming tests found.");
    h.command("1", "deadline-list", &[]).await;
    assert_eq!(h.last_reply(), "You have no deadlines.");
    h.command("1", "exam-plan", &[]).await;
    assert_eq!(h.last_reply(), "No exams scheduled.");
    h.command("1", "viewprofile", &[("user", "<@9>")]).await;
    assert_eq!(h.last_reply(), "<@9> hasn't created a profile.");
}

#[tokio::test]
async fn test_deadlines_are_per_owner() {
    let h = Harness::new(Ok("unused"));
    let date = days_from_today(10);
    h.command(
        "1",
        "deadline",
        &[("subject", "IB ESS"), ("work", "IA draft"), ("date", &date)],
    )
    .await;
    assert!(h.last_reply().contains("**IA draft**"));
    // -7, -2 and -1 days are all still ahead.
    assert_eq!(h.bot.reminders().pending(), 3);

    h.command("1", "deadline-list", &[]).await;
    assert!(h.last_reply().contains(&format!("1. IB ESS – IA draft (due {date})")));

    h.command("2", "deadline-list", &[]).await;
    assert_eq!(h.last_reply(), "You have no deadlines.");
}

#[tokio::test]
async fn test_profile_selection_roundtrip() {
    let h = Harness::new(Ok("unused"));
    h.command("1", "profile", &[]).await;
    let menu = h.messenger.messages().pop().unwrap();
    assert_eq!(menu.message.content, "Choose your subjects:");
    assert!(matches!(
        &menu.message.components[..],
        [Component::Select { custom_id, max_values: 10, .. }] if custom_id == SUBJECT_SELECT_ID
    ));

    h.component("1", SUBJECT_SELECT_ID, &["IB Math AA", "IB Physics"]).await;
    h.command("2", "viewprofile", &[("user", "1")]).await;
    assert_eq!(
        h.last_reply(),
        "**<@1>'s Subject Profile**\n**1.** IB Math AA\n**2.** IB Physics"
    );

    // Unknown subjects are rejected and leave the profile alone.
    h.component("1", SUBJECT_SELECT_ID, &["Astrology"]).await;
    assert!(h.last_reply().contains("Unknown subject"));
    assert_eq!(
        h.store.get_user_subjects(&UserId::new("1")).unwrap(),
        vec!["IB Math AA".to_string(), "IB Physics".to_string()]
    );
}

#[tokio::test]
async fn test_long_explanation_is_split_into_chunks() {
    let answer = "abcdefghij".repeat(250);
    let h = Harness::new(Ok(&answer));
    h.command("1", "explain", &[("question", "entropy")]).await;

    let replies = h.replies();
    assert_eq!(replies.len(), 3, "{replies:#?}");
    assert_eq!(replies[0], "📚 **Explanation too long. Splitting:**");
    assert_eq!(replies[1].chars().count(), 1900);
    assert_eq!(replies[2].chars().count(), 600);
    assert_eq!(format!("{}{}", replies[1], replies[2]), answer);
    assert_eq!(*h.generator.prompts.lock().unwrap(), vec!["Explain: entropy"]);
}

#[tokio::test]
async fn test_short_explanation_edits_the_pending_message() {
    let h = Harness::new(Ok("Entropy measures disorder."));
    h.command("1", "explain", &[("question", "entropy")]).await;
    assert_eq!(
        h.replies(),
        vec!["📚 **Explanation:**\nEntropy measures disorder.".to_string()]
    );
    assert_eq!(h.messenger.messages()[0].edits, 1);
}

#[tokio::test]
async fn test_service_failures_become_generic_replies() {
    let h = Harness::new(Err(()));
    h.command("1", "explain", &[("question", "entropy")]).await;
    assert_eq!(h.last_reply(), "❌ Failed to generate explanation.");

    let unconfigured = Harness::with_generator(Ok("never"), false);
    unconfigured
        .command("1", "explain", &[("question", "entropy")])
        .await;
    assert_eq!(unconfigured.last_reply(), "❌ Failed to generate explanation.");
}

#[tokio::test]
async fn test_summarize_checks_type_and_truncates() {
    let h = Harness::new(Ok("Short summary."));
    h.command("1", "summarize", &[("file", "slides.pptx")]).await;
    assert_eq!(h.last_reply(), "Only PDF files supported.");
    assert!(h.generator.prompts.lock().unwrap().is_empty());

    let pdf = Attachment {
        name: "notes.pdf".into(),
        source: AttachmentSource::Bytes(b"%PDF".to_vec()),
    };
    let invocation = CommandInvocation::new("summarize", UserId::new("1"), "maya", channel())
        .option("file", OptionValue::Attachment(pdf));
    h.bot.handle(Interaction::Command(invocation)).await;

    assert_eq!(h.last_reply(), "📝 **Summary:**\nShort summary.");
    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts[0].chars().count(), 15_000);
}

#[tokio::test]
async fn test_pdf_extraction_leaves_the_runtime_free() {
    let (open_gate, gate) = std::sync::mpsc::channel();
    let h = Harness::build(
        Ok("Gated summary."),
        true,
        Arc::new(GatedText {
            gate: Mutex::new(gate),
        }),
    );

    // Only runs if extraction yields the (single-threaded) runtime.
    let opener = tokio::spawn(async move {
        open_gate.send(()).unwrap();
    });

    let pdf = Attachment {
        name: "notes.pdf".into(),
        source: AttachmentSource::Bytes(b"%PDF".to_vec()),
    };
    let invocation = CommandInvocation::new("summarize", UserId::new("1"), "maya", channel())
        .option("file", OptionValue::Attachment(pdf));
    h.bot.handle(Interaction::Command(invocation)).await;

    opener.await.unwrap();
    assert_eq!(h.last_reply(), "📝 **Summary:**\nGated summary.");
    assert_eq!(h.generator.prompts.lock().unwrap()[0], "gated notes");
}

#[tokio::test]
async fn test_exam_plan_uses_subscribed_tests() {
    let h = Harness::new(Ok("Day 1: waves."));
    h.component("1", SUBJECT_SELECT_ID, &["IB Physics"]).await;
    let date = days_from_today(20);
    h.command(
        "1",
        "test-add",
        &[("subject", "IB Physics"), ("date", &date), ("portion", "Waves")],
    )
    .await;
    h.command(
        "1",
        "test-add",
        &[("subject", "IB ESS"), ("date", &date), ("portion", "Topic 3")],
    )
    .await;

    h.command("1", "exam-plan", &[]).await;
    assert_eq!(h.last_reply(), "🗓️ **Plan:**\nDay 1: waves.");
    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].starts_with(&format!("1 has exams: IB Physics on {date} for Waves.")));
    assert!(!prompts[0].contains("IB ESS"));
}

#[tokio::test(start_paused = true)]
async fn test_pomodoro_buttons_check_ownership() {
    let h = Harness::new(Ok("unused"));
    h.command(
        "owner",
        "pomdorro",
        &[("studytime", "1"), ("breaktime", "1"), ("sessioncount", "1")],
    )
    .await;
    let handle = h
        .bot
        .sessions()
        .latest_for(&UserId::new("owner"))
        .expect("session registered");

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    h.component("stranger", &button_id(handle.id(), ControlAction::Cancel), &[])
        .await;
    assert_eq!(h.last_reply(), NOT_YOUR_SESSION_REPLY);
    assert_eq!(h.bot.sessions().len(), 1);

    h.component("owner", &button_id(handle.id(), ControlAction::Cancel), &[])
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.bot.sessions().is_empty());
    assert!(h.last_reply().contains("cancelled"));

    h.component("owner", &button_id(handle.id(), ControlAction::Pause), &[])
        .await;
    assert_eq!(h.last_reply(), SESSION_ENDED_REPLY);
}

#[tokio::test]
async fn test_pomodoro_limits_are_enforced() {
    let h = Harness::new(Ok("unused"));
    h.command(
        "1",
        "pomodoro",
        &[("studytime", "500"), ("breaktime", "5"), ("sessioncount", "1")],
    )
    .await;
    assert_eq!(h.last_reply(), "❌ Option `studytime` must be at most 180.");
    assert!(h.bot.sessions().is_empty());

    h.command("1", "pomodoro", &[("studytime", "25")]).await;
    assert_eq!(h.last_reply(), "❌ Missing option `breaktime`.");
}
