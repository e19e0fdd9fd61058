use buzzwin_core::email::templates;
use buzzwin_core::{Config, IdentityProvider, InvitationRequest, SqliteStore};
use clap::Subcommand;
use serde_json::json;

use super::{email_sink, print_json, CliResult};

#[derive(Subcommand)]
pub enum InviteAction {
    /// Send a hand-written invitation
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        /// HTML body
        #[arg(long)]
        html: String,
        /// Plain-text body (default: the subject)
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Invite someone to Buzzwin, optionally to a ritual, using the stock template
    Ritual {
        #[arg(long)]
        to: String,
        /// Inviting user
        #[arg(long)]
        user: String,
        /// Ritual to invite to
        #[arg(long)]
        ritual: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn deliver(config: &Config, request: InvitationRequest, dry_run: bool) -> CliResult {
    let message = request.into_message()?;
    let sink = email_sink(config, dry_run)?;
    sink.send(&message)?;
    print_json(&json!({
        "sent": true,
        "dry_run": dry_run,
        "to": message.to,
        "subject": message.subject,
    }))
}

pub fn run(action: InviteAction) -> CliResult {
    let config = Config::load()?;

    match action {
        InviteAction::Send {
            to,
            subject,
            html,
            text,
            dry_run,
        } => deliver(&config, InvitationRequest { to, subject, html, text }, dry_run),
        InviteAction::Ritual {
            to,
            user,
            ritual,
            dry_run,
        } => {
            let store = SqliteStore::open()?;
            let ritual = match ritual {
                Some(id) => Some(store.get_ritual(&id)?.ok_or_else(|| format!("ritual not found: {id}"))?),
                None => None,
            };
            let inviter = store.display_name(&user)?.unwrap_or(user);
            let request = templates::invitation(&to, &inviter, ritual.as_ref(), &config.app_url);
            deliver(&config, request, dry_run)
        }
    }
}
