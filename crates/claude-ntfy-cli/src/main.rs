//! claude-ntfy -- transparent wrapper around the claude CLI.
//!
//! Everything on the command line that is not one of our few flags passes
//! through to claude verbatim, the terminal behaves as if claude were run
//! directly, and the wrapper's only observable action is a single ntfy push
//! when the session sits idle past the configured deadline. No business
//! logic lives here; this file only wires config, sink, engine, transport,
//! and signals together.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use claude_ntfy_alert::{Notification, Notifier, NtfyDispatcher};
use claude_ntfy_types::{
    find_claude, CliOverrides, ConfigLoader, WRAP_MARKER_ENV,
};
use claude_ntfy_wrap::term;
use claude_ntfy_wrap::{BackstopEngine, OutputTap, PtySession, SignalForwarder, Supervisor};

/// Transparent claude wrapper with idle push notifications.
///
/// Help and version flags are disabled on purpose: `--version` always
/// belongs to claude, and `--help` belongs to claude whenever any other
/// argument is present.
#[derive(Parser, Debug)]
#[command(
    name = "claude-ntfy",
    about = "Run claude and get an ntfy push when it is waiting on you",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Override the config file location for this run
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable all notifications
    #[arg(long)]
    quiet: bool,

    /// Everything else is handed to claude unchanged, in order
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    // Refuse to wrap ourselves. If the marker is in our environment, the
    // "claude" we would spawn is this wrapper again.
    if std::env::var(WRAP_MARKER_ENV).as_deref() == Ok("1") {
        eprintln!("claude-ntfy: already wrapped by claude-ntfy, refusing to start");
        return 1;
    }

    let cli = Cli::parse();

    // Diagnostics go to stderr only; stdout belongs to the child.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // `--help` alone is ours; `--help` next to anything else is claude's.
    if cli.args.as_slice() == ["--help"] && cli.config.is_none() && !cli.quiet {
        print_usage();
        return 0;
    }

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        quiet: cli.quiet,
    };
    let config = match ConfigLoader::new(overrides).load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("claude-ntfy: {e}");
            return 1;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("claude-ntfy: {e}");
        return 1;
    }

    let program = match find_claude(config.claude_path.as_deref()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("claude-ntfy: {e}");
            return 1;
        }
    };

    let mut args = config.default_args.clone();
    args.extend(cli.args.iter().cloned());

    // Notification plumbing. Quiet mode gets a silent sink and a disabled
    // engine; the transport below is identical either way.
    let dispatcher = if config.notifications_enabled() {
        match NtfyDispatcher::spawn(&config.ntfy_server, &config.ntfy_topic) {
            Ok(dispatcher) => Some(Arc::new(dispatcher)),
            Err(e) => {
                eprintln!("claude-ntfy: {e}");
                return 1;
            }
        }
    } else {
        None
    };
    let sink: Arc<dyn Notifier> = match &dispatcher {
        Some(dispatcher) => Arc::clone(dispatcher) as Arc<dyn Notifier>,
        None => Arc::new(SilentSink),
    };

    if config.startup_notify && config.notifications_enabled() {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        sink.notify(Notification::startup(&cwd));
    }

    let timeout = if config.notifications_enabled() {
        config.backstop_timeout
    } else {
        Duration::ZERO
    };
    let engine = BackstopEngine::start(timeout, Arc::clone(&sink));

    let pty = match PtySession::spawn(&program, &args) {
        Ok(pty) => Arc::new(pty),
        Err(e) => {
            engine.close();
            eprintln!("claude-ntfy: {e}");
            return 1;
        }
    };

    let signals = match SignalForwarder::install(Arc::clone(&pty), term::stdin_is_tty()) {
        Ok(signals) => Some(signals),
        Err(e) => {
            // The session still works without forwarding; degrade, don't die.
            eprintln!("claude-ntfy: {e}");
            None
        }
    };

    let supervisor = Supervisor::new(Arc::clone(&pty));
    let exit_code = match supervisor.run(OutputTap::new(Arc::clone(&engine))) {
        Ok(code) => code,
        Err(e) => {
            supervisor.restore_terminal();
            eprintln!("claude-ntfy: {e}");
            1
        }
    };

    drop(signals);
    engine.close();
    if let Some(dispatcher) = dispatcher {
        dispatcher.close();
    }

    exit_code
}

/// Sink used in quiet mode.
struct SilentSink;

impl Notifier for SilentSink {
    fn notify(&self, _notification: Notification) {}
}

fn print_usage() {
    let mut command = Cli::command();
    let _ = command.print_long_help();
    println!();
    println!("Environment variables:");
    println!("  NTFY_TOPIC             ntfy topic for notifications");
    println!("  NTFY_SERVER            ntfy server URL (default: https://ntfy.sh)");
    println!("  NTFY_BACKSTOP_TIMEOUT  idle deadline, e.g. 30s or 2m (default: 30s)");
    println!("  NTFY_QUIET             disable notifications (true/false)");
    println!("  NTFY_STARTUP           send a notification at session start (true/false)");
    println!("  NTFY_DEFAULT_ARGS      default claude args, comma-separated");
    println!("  NTFY_CONFIG            path to the config file");
    println!("  NTFY_CLAUDE_PATH       path to the real claude binary");
    println!();
    println!("Configuration file: ~/.config/claude-ntfy/config.yaml");
}
