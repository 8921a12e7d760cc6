use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use sessionkit::config::{ConfigError, SessionConfig};
use sessionkit::error::{RequestError, SessionError, TransportError};
use sessionkit::guard::{Redirect, RouteClass};
use sessionkit::notify::{LocalNotifier, Notifier, subscribe_channel};
use sessionkit::request::RequestOptions;
use sessionkit::session::SessionManager;
use sessionkit::store::{FileTokenStore, TokenKey, TokenStore};
use sessionkit::transport::{HttpResponse, Method, ReqwestTransport};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("http client unavailable: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("invalid query pair `{0}`; expected key=value")]
    InvalidQuery(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "sessionctl", about = "Access/refresh token session CLI")]
struct Cli {
    /// Overrides `SESSION_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `SESSION_TOKEN_FILE`.
    #[arg(long)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a token pair.
    Login {
        account: String,
        #[arg(long, env = "SESSION_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored tokens.
    Logout,
    /// Show which tokens are stored.
    Status,
    /// Validate the session, refreshing if needed.
    Check {
        #[arg(long, default_value_t = false)]
        restricted: bool,
    },
    /// Send an authenticated request.
    Request {
        method: String,
        /// Absolute URL, or a path joined to the base URL.
        path: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
    /// Print auth events until interrupted.
    Watch,
}

/// Restricted routes have nowhere to navigate in a terminal.
struct PrintRedirect;

impl Redirect for PrintRedirect {
    fn redirect(&self, target: &str) {
        eprintln!("session expired; log in again ({target})");
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = SessionConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(token_file) = cli.token_file {
        config.token_file = token_file;
    }

    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::open(config.token_file.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LocalNotifier::new());
    let transport = Arc::new(ReqwestTransport::new(config.timeouts)?);
    let session = SessionManager::new(config, store, notifier, transport, Arc::new(PrintRedirect));

    match cli.command {
        Command::Login { account, password } => {
            session.login(&account, &password).await?;
            println!("ok");
            Ok(())
        }
        Command::Logout => {
            session.logout();
            println!("ok");
            Ok(())
        }
        Command::Status => run_status(&session),
        Command::Check { restricted } => run_check(&session, restricted).await,
        Command::Request { method, path, body, query } => run_request(&session, &method, &path, body, &query).await,
        Command::Watch => run_watch(&session).await,
    }
}

fn run_status(session: &SessionManager) -> Result<(), CliError> {
    let tokens = session.session();
    let status = serde_json::json!({
        "token_file": session.config().token_file.display().to_string(),
        "access_token": tokens.get(TokenKey::AccessToken).is_some(),
        "refresh_token": tokens.get(TokenKey::RefreshToken).is_some(),
    });
    print_json(&status)
}

async fn run_check(session: &SessionManager, restricted: bool) -> Result<(), CliError> {
    let route = if restricted { RouteClass::Restricted } else { RouteClass::Public };
    if session.check(route).await {
        println!("valid");
        Ok(())
    } else {
        Err(CliError::NotAuthenticated)
    }
}

async fn run_request(
    session: &SessionManager,
    method: &str,
    path: &str,
    body: Option<String>,
    query: &[String],
) -> Result<(), CliError> {
    let method = parse_method(method)?;
    let url = resolve_url(&session.config().base_url, path);

    let mut options = RequestOptions::default();
    for pair in query {
        let (key, value) = parse_query_pair(pair)?;
        options = options.query(key, value);
    }
    if let Some(body) = body {
        options = options.json(serde_json::from_str::<Value>(&body)?);
    }

    let response = session.client().request(method, &url, options).await?;
    print_response(&response)?;
    if response.is_success() {
        Ok(())
    } else {
        Err(CliError::Status(response.status))
    }
}

async fn run_watch(session: &SessionManager) -> Result<(), CliError> {
    let (_subscription, mut events) = subscribe_channel(session.notifier().as_ref(), 64);
    let _watcher = session.watch();
    tracing::info!(token_file = %session.config().token_file.display(), "watching token storage");

    loop {
        tokio::select! {
            Some(event) = events.recv() => println!("{}", event.name()),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
        }
    }
}

fn parse_method(raw: &str) -> Result<Method, CliError> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|_| CliError::InvalidMethod(raw.to_owned()))
}

fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn parse_query_pair(raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(CliError::InvalidQuery(raw.to_owned())),
    }
}

fn print_response(response: &HttpResponse) -> Result<(), CliError> {
    match serde_json::from_str::<Value>(&response.body) {
        Ok(json) => print_json(&json),
        Err(_) => {
            println!("{}", response.body);
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
