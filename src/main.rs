use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use examroom::data::{Database, Role, User, UserStore};
use examroom::web::{run_server, ServerConfig, WebAppState};
use examroom::{util, Config};

/// School assessment server with anti-cheating tracking.
#[derive(Parser)]
#[command(name = "examroom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (defaults to ~/.examroom)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server.
    Serve(ServeArgs),

    /// Create an account directly in the database.
    ///
    /// Use this to bootstrap the first teacher, who can then create other
    /// accounts through the API.
    CreateUser(CreateUserArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Log to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,

    #[arg(long)]
    password: String,

    /// `student` or `teacher`
    #[arg(long)]
    role: Role,

    /// Defaults to the username
    #[arg(long)]
    display_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir);

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::CreateUser(args) => {
            init_logging(false)?;
            create_user(args)
        }
    }
}

/// Initialize logging to file (~/.examroom/logs/examroom.log) or stderr.
fn init_logging(to_stderr: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    fs::create_dir_all(util::logs_dir())?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    init_logging(args.log_stderr)?;

    let mut config = Config::load();
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    let db = Database::open_default().context("Failed to open database")?;
    let users = UserStore::new(db.clone()).count()?;
    if users == 0 {
        tracing::warn!("No accounts exist yet; create a teacher with `examroom create-user`");
    }

    let server_config = ServerConfig::from(&config);
    println!(
        "examroom listening on http://{}:{}",
        server_config.host, server_config.port
    );

    let state = WebAppState::new(config, db);
    run_server(state, server_config).await
}

fn create_user(args: CreateUserArgs) -> Result<()> {
    if args.username.trim().is_empty() || args.password.is_empty() {
        bail!("username and password must not be empty");
    }

    let db = Database::open_default().context("Failed to open database")?;
    let store = UserStore::new(db);

    let display_name = args
        .display_name
        .unwrap_or_else(|| args.username.clone());
    let user = User::new(args.username.trim(), display_name, args.role, &args.password);

    match store.create(&user) {
        Ok(()) => {}
        Err(e) if e.is_constraint_violation() => {
            bail!("username '{}' is already taken", user.username)
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(username = %user.username, role = %user.role, "User created from CLI");
    println!("Created {} '{}' ({})", user.role, user.username, user.id);
    Ok(())
}
