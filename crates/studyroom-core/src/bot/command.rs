//! Typed command invocations and their validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use url::Url;

use crate::dates::parse_date;
use crate::error::ValidationError;
use crate::platform::{ChannelId, MessageId, UserId};

/// Custom id of the subject selection menu sent by `profile`.
pub const SUBJECT_SELECT_ID: &str = "subject-select";

/// Where attachment bytes can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Url(Url),
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub source: AttachmentSource,
}

impl Attachment {
    /// Attachment from a URL or a local path, named after its last segment.
    pub fn from_location(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self {
                name: url
                    .path_segments()
                    .and_then(|mut s| s.next_back())
                    .unwrap_or_default()
                    .to_string(),
                source: AttachmentSource::Url(url),
            },
            _ => {
                let path = PathBuf::from(location);
                Self {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    source: AttachmentSource::Path(path),
                }
            }
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.name.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// A named command option as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    User(UserId),
    Attachment(Attachment),
}

/// A slash command as received from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub user: UserId,
    pub username: String,
    pub channel: ChannelId,
    pub options: BTreeMap<String, OptionValue>,
}

impl CommandInvocation {
    pub fn new(
        name: impl Into<String>,
        user: UserId,
        username: impl Into<String>,
        channel: ChannelId,
    ) -> Self {
        Self {
            name: name.into(),
            user,
            username: username.into(),
            channel,
            options: BTreeMap::new(),
        }
    }

    pub fn option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        self.options.insert(name.into(), value);
        self
    }
}

/// A button press or menu selection on a message the bot sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInteraction {
    pub custom_id: String,
    pub values: Vec<String>,
    pub user: UserId,
    pub username: String,
    pub channel: ChannelId,
    /// Message carrying the component, when the platform reports it.
    pub message: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Command(CommandInvocation),
    Component(ComponentInteraction),
}

/// A validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Test,
    Profile,
    ViewProfile {
        user: UserId,
    },
    TestAdd {
        subject: String,
        date: NaiveDate,
        portion: String,
    },
    TestList,
    Deadline {
        subject: String,
        work: String,
        date: NaiveDate,
    },
    DeadlineList,
    Pomodoro {
        study_minutes: u32,
        break_minutes: u32,
        sessions: u32,
    },
    Summarize {
        file: Attachment,
    },
    Explain {
        question: String,
    },
    ExamPlan,
}

impl Command {
    /// Validate an invocation's options against the command's signature.
    pub fn parse(invocation: &CommandInvocation) -> Result<Self, ValidationError> {
        let opts = Options(&invocation.options);
        let command = match invocation.name.as_str() {
            "test" => Command::Test,
            "profile" => Command::Profile,
            "viewprofile" => Command::ViewProfile {
                user: opts.user("user")?,
            },
            "test-add" => Command::TestAdd {
                subject: opts.string("subject")?,
                date: parse_date(&opts.string("date")?)?,
                portion: opts.string("portion")?,
            },
            "test-list" => Command::TestList,
            "deadline" => Command::Deadline {
                subject: opts.string("subject")?,
                work: opts.string("work")?,
                date: parse_date(&opts.string("date")?)?,
            },
            "deadline-list" => Command::DeadlineList,
            "pomdorro" | "pomodoro" => Command::Pomodoro {
                study_minutes: opts.positive("studytime")?,
                break_minutes: opts.positive("breaktime")?,
                sessions: opts.positive("sessioncount")?,
            },
            "summarize" => Command::Summarize {
                file: opts.attachment("file")?,
            },
            "explain" => Command::Explain {
                question: opts.string("question")?,
            },
            "exam-plan" => Command::ExamPlan,
            other => {
                return Err(ValidationError::UnknownCommand {
                    name: other.to_string(),
                })
            }
        };
        Ok(command)
    }
}

/// Typed accessors over raw options.
///
/// Text hosts cannot type their options, so strings are accepted wherever
/// they can be read unambiguously as the expected kind.
struct Options<'a>(&'a BTreeMap<String, OptionValue>);

impl Options<'_> {
    fn get(&self, name: &str) -> Result<&OptionValue, ValidationError> {
        self.0
            .get(name)
            .ok_or_else(|| ValidationError::MissingArgument { name: name.into() })
    }

    fn wrong(name: &str, expected: &'static str) -> ValidationError {
        ValidationError::WrongArgumentType {
            name: name.into(),
            expected,
        }
    }

    fn string(&self, name: &str) -> Result<String, ValidationError> {
        match self.get(name)? {
            OptionValue::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            OptionValue::String(_) => Err(ValidationError::MissingArgument { name: name.into() }),
            _ => Err(Self::wrong(name, "text")),
        }
    }

    fn positive(&self, name: &str) -> Result<u32, ValidationError> {
        let value = match self.get(name)? {
            OptionValue::Integer(n) => *n,
            OptionValue::String(s) => s.trim().parse().map_err(|_| Self::wrong(name, "an integer"))?,
            _ => return Err(Self::wrong(name, "an integer")),
        };
        u32::try_from(value)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: name.into(),
                message: "must be at least 1".into(),
            })
    }

    fn user(&self, name: &str) -> Result<UserId, ValidationError> {
        match self.get(name)? {
            OptionValue::User(id) => Ok(id.clone()),
            OptionValue::String(s) => {
                let s = s.trim();
                let id = s
                    .strip_prefix("<@")
                    .and_then(|rest| rest.strip_suffix('>'))
                    .unwrap_or(s);
                if id.is_empty() {
                    Err(ValidationError::MissingArgument { name: name.into() })
                } else {
                    Ok(UserId::new(id))
                }
            }
            _ => Err(Self::wrong(name, "a user")),
        }
    }

    fn attachment(&self, name: &str) -> Result<Attachment, ValidationError> {
        match self.get(name)? {
            OptionValue::Attachment(a) => Ok(a.clone()),
            OptionValue::String(s) if !s.trim().is_empty() => Ok(Attachment::from_location(s.trim())),
            _ => Err(Self::wrong(name, "a file")),
        }
    }
}
