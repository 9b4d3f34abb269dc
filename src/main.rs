use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use taskdeck::config::{AppConfig, BackendConfig, ConfigError};
use taskdeck::remote::{AuthBackend, MemoryBackend, RemoteError, RestBackend, TableBackend};
use taskdeck::services::auth_error::SIGN_UP_CONFIRMATION_MESSAGE;
use taskdeck::services::forms::{submit_login, submit_sign_up};
use taskdeck::services::session::SessionController;
use taskdeck::services::tasks::{Task, TaskList};
use taskdeck::services::validation::FormErrors;
use taskdeck::state::CurrentUserState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("remote service error: {0}")]
    Remote(#[from] RemoteError),
    #[error("{0}")]
    Invalid(#[from] FormErrors),
    #[error("{0}")]
    Auth(String),
    #[error("not signed in; run `taskdeck login` first")]
    NotSignedIn,
    #[error("no task with id {0}")]
    UnknownTask(String),
    #[error("task request failed; rerun with TASKDECK_LOG_LEVEL=debug for details")]
    TaskFailed,
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "taskdeck", about = "Personal task list backed by a hosted identity and table service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Signup(Credentials),
    /// Sign in with email and password.
    Login {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long, default_value_t = false)]
        remember_me: bool,
    },
    /// Sign out and forget the stored session.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Manage the signed-in user's tasks.
    Tasks(TasksCommand),
    /// Interactive prompt accepting the same commands, one per line.
    Shell,
}

#[derive(Args, Debug, Clone)]
struct Credentials {
    #[arg(long, env = "TASKDECK_EMAIL")]
    email: String,

    #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Subcommand, Debug)]
enum TasksSubcommand {
    List,
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    Toggle {
        id: String,
    },
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    Delete {
        id: String,
    },
}

struct App {
    config: AppConfig,
    tables: Arc<dyn TableBackend>,
    session: SessionController,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(io::stderr)
        .init();

    let app = App::connect(config)?;
    app.session.restored().await;

    match cli.command {
        Command::Shell => app.shell().await,
        command => app.execute(command).await,
    }
}

fn backends(config: &BackendConfig) -> Result<(Arc<dyn AuthBackend>, Arc<dyn TableBackend>), CliError> {
    match config {
        BackendConfig::Rest(rest) => {
            let backend = Arc::new(RestBackend::new(rest)?);
            let auth: Arc<dyn AuthBackend> = backend.clone();
            let tables: Arc<dyn TableBackend> = backend;
            Ok((auth, tables))
        }
        BackendConfig::Memory => {
            warn!("using the in-memory backend; accounts and tasks vanish when the process exits");
            let backend = Arc::new(MemoryBackend::new());
            let auth: Arc<dyn AuthBackend> = backend.clone();
            let tables: Arc<dyn TableBackend> = backend;
            Ok((auth, tables))
        }
    }
}

impl App {
    fn connect(config: AppConfig) -> Result<Self, CliError> {
        let (auth, tables) = backends(&config.backend)?;
        let session = SessionController::new(auth, Arc::clone(&tables), config.auth_timeout);
        Ok(Self { config, tables, session })
    }

    async fn execute(&self, command: Command) -> Result<(), CliError> {
        match command {
            Command::Signup(credentials) => self.sign_up(&credentials).await,
            Command::Login { credentials, remember_me } => self.login(&credentials, remember_me).await,
            Command::Logout => {
                self.session.logout().await;
                println!("Signed out.");
                Ok(())
            }
            Command::Whoami => {
                match self.session.snapshot().status() {
                    CurrentUserState::Authenticated(user) => println!("{} ({})", user.email, user.id),
                    _ => println!("Not signed in."),
                }
                Ok(())
            }
            Command::Tasks(tasks) => self.tasks(tasks.command).await,
            Command::Shell => Ok(()),
        }
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), CliError> {
        submit_sign_up(&self.session, &credentials.email, &credentials.password, self.config.password_min_len).await?;

        let snapshot = self.session.snapshot();
        match (snapshot.user, snapshot.error) {
            (Some(user), _) => {
                println!("Account created. Signed in as {}.", user.email);
                Ok(())
            }
            (None, Some(message)) if message == SIGN_UP_CONFIRMATION_MESSAGE => {
                println!("{message}");
                Ok(())
            }
            (None, message) => Err(CliError::Auth(message.unwrap_or_else(|| "sign-up failed".to_owned()))),
        }
    }

    async fn login(&self, credentials: &Credentials, remember_me: bool) -> Result<(), CliError> {
        submit_login(
            &self.session,
            &credentials.email,
            &credentials.password,
            remember_me,
            self.config.password_min_len,
        )
        .await?;

        let snapshot = self.session.snapshot();
        match (snapshot.user, snapshot.error) {
            (Some(user), _) => {
                println!("Signed in as {}.", user.email);
                Ok(())
            }
            (None, message) => Err(CliError::Auth(message.unwrap_or_else(|| "sign-in failed".to_owned()))),
        }
    }

    async fn tasks(&self, command: TasksSubcommand) -> Result<(), CliError> {
        let user = self.session.snapshot().user.ok_or(CliError::NotSignedIn)?;
        let mut list = TaskList::new(Arc::clone(&self.tables), user.id);
        if !list.load().await {
            return Err(CliError::TaskFailed);
        }

        let applied = match command {
            TasksSubcommand::List => true,
            TasksSubcommand::Add { text } => list.add(&text.join(" ")).await,
            TasksSubcommand::Toggle { id } => {
                require_task(list.tasks(), &id)?;
                list.toggle_complete(&id).await
            }
            TasksSubcommand::Edit { id, text } => {
                require_task(list.tasks(), &id)?;
                list.edit_text(&id, &text.join(" ")).await
            }
            TasksSubcommand::Delete { id } => {
                require_task(list.tasks(), &id)?;
                list.delete(&id).await
            }
        };
        if !applied {
            return Err(CliError::TaskFailed);
        }
        print_tasks(list.tasks());
        Ok(())
    }

    async fn shell(&self) -> Result<(), CliError> {
        println!("taskdeck shell. Type `help` for commands, `quit` to leave.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("taskdeck> ");
            io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "quit" | "exit") {
                break;
            }

            match Cli::try_parse_from(std::iter::once("taskdeck").chain(line.split_whitespace())) {
                Ok(Cli { command: Command::Shell }) => println!("Already in the shell."),
                Ok(cli) => {
                    if let Err(e) = self.execute(cli.command).await {
                        eprintln!("error: {e}");
                    }
                }
                // Covers `help` and `--help` too.
                Err(e) => {
                    let _ = e.print();
                }
            }
        }
        Ok(())
    }
}

fn require_task(tasks: &[Task], id: &str) -> Result<(), CliError> {
    if tasks.iter().any(|t| t.id == id) {
        Ok(())
    } else {
        Err(CliError::UnknownTask(id.to_owned()))
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks yet.");
        return;
    }
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        println!("[{mark}] {:>4}  {}", task.id, task.text);
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
