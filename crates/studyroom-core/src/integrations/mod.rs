//! Chat platform adapters and credential storage.

pub mod console;
pub mod discord;
pub mod recording;

pub use console::ConsoleMessenger;
pub use discord::DiscordWebhook;
pub use recording::RecordingMessenger;

/// Keyring entry for the text-generation API key.
pub const AI_API_KEY: &str = "groq_api_key";
/// Keyring entry for the reminder webhook URL.
pub const DISCORD_WEBHOOK_KEY: &str = "discord_webhook_url";

/// Environment overrides for the keyring entries above.
pub const AI_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DISCORD_WEBHOOK_ENV: &str = "STUDYROOM_DISCORD_WEBHOOK";

/// Look a credential up in the environment first, then in the OS keyring.
pub fn credential(key: &str, env_var: &str) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    match keyring_store::get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(key, error = %e, "keyring lookup failed");
            None
        }
    }
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "studyroom";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
