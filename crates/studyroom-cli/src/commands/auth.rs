use clap::Subcommand;
use studyroom_core::integrations::{
    credential, keyring_store, DiscordWebhook, AI_API_KEY, AI_API_KEY_ENV, DISCORD_WEBHOOK_ENV,
    DISCORD_WEBHOOK_KEY,
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Groq (text generation): login / logout / status
    Groq {
        #[command(subcommand)]
        action: AuthOp,
    },
    /// Discord reminder webhook: login / logout / status
    Discord {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Store credentials in the OS keyring
    Login {
        /// API key (for Groq)
        #[arg(long)]
        token: Option<String>,
        /// Webhook URL (for Discord)
        #[arg(long)]
        webhook_url: Option<String>,
    },
    /// Remove credentials
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Groq { action: op } => handle_groq(op),
        AuthAction::Discord { action: op } => handle_discord(op),
    }
}

fn status(configured: bool) -> &'static str {
    if configured {
        "authenticated"
    } else {
        "not authenticated"
    }
}

fn handle_groq(op: AuthOp) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        AuthOp::Login { token, .. } => {
            let tok = token.ok_or("--token required for Groq")?;
            if tok.trim().is_empty() {
                return Err("--token must not be empty".into());
            }
            keyring_store::set(AI_API_KEY, tok.trim())?;
            println!("Groq API key stored");
        }
        AuthOp::Logout => {
            keyring_store::delete(AI_API_KEY)?;
            println!("Groq API key removed");
        }
        AuthOp::Status => {
            println!("{}", status(credential(AI_API_KEY, AI_API_KEY_ENV).is_some()));
        }
    }
    Ok(())
}

fn handle_discord(op: AuthOp) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        AuthOp::Login { webhook_url, .. } => {
            let url = webhook_url.ok_or("--webhook-url required for Discord")?;
            DiscordWebhook::store_credentials(&url)?;
            println!("Discord webhook stored");
        }
        AuthOp::Logout => {
            DiscordWebhook::clear_credentials()?;
            println!("Discord webhook removed");
        }
        AuthOp::Status => {
            println!(
                "{}",
                status(credential(DISCORD_WEBHOOK_KEY, DISCORD_WEBHOOK_ENV).is_some())
            );
        }
    }
    Ok(())
}
