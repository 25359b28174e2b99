use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use todo_client::app::App;
use todo_client::config::{ClientConfig, DEFAULT_API_URL};
use todo_client::error::{ApiError, ConfigError, StorageError};
use todo_client::net::http::ExpiryFlag;
use todo_client::net::types::{ImageUpload, LoginData, SignupData, Todo, TodoDraft, TodoUpdate};
use todo_client::state::auth::should_redirect_unauth;
use todo_client::state::dashboard::Dashboard;
use todo_client::util::notify::{ConsoleNotifier, Notifier, SilentNotifier};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `todo-cli login` first")]
    NotLoggedIn,
    #[error("session expired; run `todo-cli login` to sign in again")]
    SessionExpired,
    #[error("could not load todos: {0}")]
    Fetch(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "todo-cli", about = "To-do backend client")]
struct Cli {
    #[arg(long, env = "TODO_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, env = "TODO_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[arg(long, short, default_value_t = false, help = "Suppress success and error notices")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TODO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TODO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Todos(TodosCommand),
    /// Download an attached image.
    Image {
        filename: String,
        #[arg(long, help = "Output path; defaults to the image's file name")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct TodosCommand {
    #[command(subcommand)]
    command: TodosSubcommand,
}

#[derive(Subcommand, Debug)]
enum TodosSubcommand {
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Toggle {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Delete {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    if let Err(error) = dotenv {
        if !error.not_found() {
            tracing::warn!(%error, "failed to load .env");
        }
    }

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?.with_api_url(&cli.api_url)?;
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }

    let notifier: Arc<dyn Notifier> = if cli.quiet { Arc::new(SilentNotifier) } else { Arc::new(ConsoleNotifier) };
    let expired = ExpiryFlag::default();
    let app = App::new(config, expired.hook(), notifier)?;
    app.auth.initialize().await;

    match cli.command {
        Command::Login { username, password } => {
            let user = app.auth.login(&LoginData { username, password }).await?;
            println!("logged in as {} <{}>", user.username, user.email);
            Ok(())
        }
        Command::Signup { username, email, password } => {
            let created = app.auth.signup(&SignupData { username, email, password }).await?;
            println!("created user {}", created.user_id);
            Ok(())
        }
        Command::Logout => Ok(app.auth.logout()?),
        Command::Whoami => {
            let user = app.auth.user().ok_or_else(|| not_logged_in(&expired))?;
            println!("{} <{}> (id {})", user.username, user.email, user.id);
            Ok(())
        }
        Command::Todos(todos) => run_todos(&app, &expired, todos).await,
        Command::Image { filename, output } => {
            let bytes = app.todos.fetch_image(&filename).await?;
            let output = output.unwrap_or_else(|| default_image_path(&filename));
            std::fs::write(&output, &bytes)?;
            println!("saved {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}

async fn run_todos(app: &App, expired: &ExpiryFlag, todos: TodosCommand) -> Result<(), CliError> {
    let state = app.auth.state();
    if should_redirect_unauth(&state) {
        return Err(not_logged_in(expired));
    }
    let mut dash = app.dashboard();
    dash.mount(&state).await;
    if let Some(error) = &dash.state().error {
        if expired.is_set() {
            return Err(CliError::SessionExpired);
        }
        return Err(CliError::Fetch(error.clone()));
    }

    match todos.command {
        TodosSubcommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(dash.todos())?);
            } else {
                print_dashboard(app, &dash);
            }
            Ok(())
        }
        TodosSubcommand::Add { title, description, image } => {
            let image = image.as_deref().map(ImageUpload::from_path).transpose()?;
            let todo = dash.add(&TodoDraft { title, description, image }).await?;
            println!("{}", format_todo(app, &todo));
            Ok(())
        }
        TodosSubcommand::Toggle { id } => {
            let done = dash.toggle(id).await?;
            println!("#{id} is now {}", if done { "completed" } else { "pending" });
            Ok(())
        }
        TodosSubcommand::Update { id, title, description, completed, image } => {
            let image = image.as_deref().map(ImageUpload::from_path).transpose()?;
            let changes = TodoUpdate { title, description, is_completed: completed, image };
            dash.update(id, &changes).await?;
            Ok(())
        }
        TodosSubcommand::Delete { id } => Ok(dash.delete(id).await?),
    }
}

fn print_dashboard(app: &App, dash: &Dashboard) {
    let progress = dash.progress();
    println!(
        "{}/{} completed ({}%), {} pending",
        progress.completed, progress.total, progress.percent, progress.pending
    );
    for todo in dash.todos() {
        println!("{}", format_todo(app, todo));
    }
}

fn format_todo(app: &App, todo: &Todo) -> String {
    let mark = if todo.is_completed { "x" } else { " " };
    let mut line = format!("[{mark}] #{} {}", todo.id, todo.title);
    if !todo.description.is_empty() {
        line.push_str(&format!(": {}", todo.description));
    }
    if let Some(url) = todo.image_url.as_deref().and_then(|raw| app.todos.image_url(raw)) {
        line.push_str(&format!(" ({url})"));
    }
    line
}

fn default_image_path(filename: &str) -> PathBuf {
    Path::new(filename)
        .file_name()
        .map_or_else(|| PathBuf::from("image"), PathBuf::from)
}

/// Commands that need a session say why it is missing.
fn not_logged_in(expired: &ExpiryFlag) -> CliError {
    if expired.is_set() { CliError::SessionExpired } else { CliError::NotLoggedIn }
}
