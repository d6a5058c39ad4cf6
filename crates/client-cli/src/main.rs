use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::{Action, MemberUpdate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admin;
mod api;
mod auth;
mod config;
mod copilot;
mod relay;
mod tui;

/// Capacity of the inbox -> relay queue
const OUTBOUND_BUFFER: usize = 64;

#[derive(Parser)]
#[command(name = "prophone")]
#[command(about = "ProPhone business messaging from the terminal")]
#[command(version = env!("PROPHONE_VERSION"))]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the inbox (default)
    Inbox,
    /// Create an account
    Register {
        email: String,
        name: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in with a password or an emailed code
    Login {
        email: String,
        #[arg(long, conflicts_with = "code")]
        password: Option<String>,
        /// Sign in with a one-time code sent by email
        #[arg(long)]
        code: bool,
    },
    /// Sign out
    Logout,
    /// Show current login status
    Whoami,
    /// Show or update your profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Manage team members
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },
    /// Act as a team member until `restore`
    Impersonate {
        /// Member email or id
        member: String,
    },
    /// Return to your own account
    Restore,
    /// Ask the sales copilot; starts a conversation without a question
    Copilot { question: Option<String> },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TeamAction {
    /// List team members and the actions you may take
    List,
    Suspend { member: String },
    Ban { member: String },
    Reactivate { member: String },
    Delete { member: String },
    /// Change a member's name, avatar, role or plan
    Edit {
        member: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        plan: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prophone=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load().unwrap_or_default();
    let server = config.server_url(cli.server.as_deref());

    match cli.command.unwrap_or(Commands::Inbox) {
        Commands::Inbox => run_inbox(&config, &server).await?,
        Commands::Register {
            email,
            name,
            password,
        } => {
            let password = password_or_prompt(password)?;
            auth::register(&mut config, &server, &email, &name, &password).await?;
        }
        Commands::Login {
            email,
            password,
            code,
        } => {
            if code {
                auth::login_with_code(&mut config, &server, &email).await?;
            } else {
                let password = password_or_prompt(password)?;
                auth::login(&mut config, &server, &email, &password).await?;
            }
        }
        Commands::Logout => auth::logout(&mut config)?,
        Commands::Whoami => auth::whoami(&config, &server).await?,
        Commands::Profile { name, avatar } => {
            if name.is_none() && avatar.is_none() {
                admin::show_profile(&config, &server).await?;
            } else {
                admin::update_profile(&config, &server, name, avatar).await?;
            }
        }
        Commands::Team { action } => handle_team_command(&config, &server, action).await?,
        Commands::Impersonate { member } => {
            admin::impersonate(&mut config, &server, &member).await?
        }
        Commands::Restore => admin::restore(&mut config)?,
        Commands::Copilot { question } => copilot::run(&config, &server, question).await?,
        Commands::Config { action } => handle_config_command(action)?,
    }
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => auth::prompt("Password: "),
    }
}

/// Connect the relay in the background and hand the terminal to the inbox.
async fn run_inbox(config: &config::Config, server: &str) -> Result<()> {
    let session = config.session_context();
    let Some(token) = session.token() else {
        eprintln!("\x1b[33m🔐 Not logged in.\x1b[0m");
        eprintln!("   Run '\x1b[1mprophone login\x1b[0m' to authenticate.");
        return Ok(());
    };
    if let Some(original) = session.original_user() {
        tracing::info!("Acting as another user on behalf of {}", original.email);
    }

    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(OUTBOUND_BUFFER);
    let (events_tx, events_rx) = std::sync::mpsc::channel();
    let relay_task = tokio::spawn(relay::run(
        config::relay_url(server, token),
        outbound_rx,
        events_tx,
    ));

    let mut app = tui::App::new(shared::inbox::Inbox::seeded(), outbound_tx, events_rx);
    let result = tokio::task::block_in_place(|| app.run());

    // Dropping the app closes the outbound queue and stops the relay
    drop(app);
    if let Err(e) = relay_task.await {
        tracing::warn!("Relay task ended abnormally: {}", e);
    }
    result.map_err(Into::into)
}

async fn handle_team_command(config: &config::Config, server: &str, action: TeamAction) -> Result<()> {
    match action {
        TeamAction::List => admin::list_members(config, server).await,
        TeamAction::Suspend { member } => {
            admin::act_on_member(config, server, &member, Action::Suspend).await
        }
        TeamAction::Ban { member } => admin::act_on_member(config, server, &member, Action::Ban).await,
        TeamAction::Reactivate { member } => {
            admin::act_on_member(config, server, &member, Action::Reactivate).await
        }
        TeamAction::Delete { member } => {
            admin::act_on_member(config, server, &member, Action::Delete).await
        }
        TeamAction::Edit {
            member,
            name,
            avatar,
            role,
            plan,
        } => {
            let update = MemberUpdate {
                name,
                avatar,
                role: role.as_deref().map(admin::parse_role).transpose()?,
                plan: plan.as_deref().map(admin::parse_plan).transpose()?,
            };
            admin::edit_member(config, server, &member, update).await
        }
    }
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            match key.as_str() {
                "server" => config.remote.server = Some(value),
                _ => bail!("Unknown config key: {}. Valid keys: server", key),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            let value = match key.as_str() {
                "server" => config.remote.server.unwrap_or_default(),
                _ => bail!("Unknown config key: {}", key),
            };
            println!("{}", value);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            let session = config.session_context();
            println!("server: {}", config.server_url(None));
            match session.current() {
                Some(current) => println!("signed in: {}", current.user.email),
                None => println!("signed in: no"),
            }
            if let Some(original) = session.original_user() {
                println!("impersonating on behalf of: {}", original.email);
            }
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
