use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "buzzwin-cli", version, about = "Buzzwin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode, decode and evaluate recurrence rules
    Rrule {
        #[command(subcommand)]
        action: commands::rrule::RruleAction,
    },
    /// Quiet-hours checks
    Quiet {
        #[command(subcommand)]
        action: commands::quiet::QuietAction,
    },
    /// Ritual management
    Ritual {
        #[command(subcommand)]
        action: commands::ritual::RitualAction,
    },
    /// User accounts, preferences and streaks
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Impact moments
    Moment {
        #[command(subcommand)]
        action: commands::moment::MomentAction,
    },
    /// Morning and evening ritual reminders
    Reminders {
        #[command(subcommand)]
        action: commands::reminders::RemindersAction,
    },
    /// Weekly summary emails
    Summary {
        #[command(subcommand)]
        action: commands::reminders::SummaryAction,
    },
    /// Invitation emails
    Invite {
        #[command(subcommand)]
        action: commands::invite::InviteAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Credentials for the email relay
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Rrule { action } => commands::rrule::run(action),
        Commands::Quiet { action } => commands::quiet::run(action),
        Commands::Ritual { action } => commands::ritual::run(action),
        Commands::User { action } => commands::user::run(action),
        Commands::Moment { action } => commands::moment::run(action),
        Commands::Reminders { action } => commands::reminders::run(action),
        Commands::Summary { action } => commands::reminders::run_summary(action),
        Commands::Invite { action } => commands::invite::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "buzzwin-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
