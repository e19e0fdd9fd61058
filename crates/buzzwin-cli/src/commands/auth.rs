use buzzwin_core::storage::credentials;
use clap::Subcommand;
use serde_json::json;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the email relay API key in the OS keyring
    SetEmailKey {
        /// API key
        key: String,
    },
    /// Remove the stored email relay API key
    ClearEmailKey,
    /// Report whether an email relay API key is stored
    Status,
}

pub fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::SetEmailKey { key } => {
            credentials::set_email_api_key(&key)?;
            println!("email API key stored");
        }
        AuthAction::ClearEmailKey => {
            credentials::clear_email_api_key()?;
            println!("email API key removed");
        }
        AuthAction::Status => {
            let stored = credentials::email_api_key()?.is_some();
            print_json(&json!({ "email_api_key": stored }))?;
        }
    }
    Ok(())
}
