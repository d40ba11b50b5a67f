//! asterm - console client for Kawasaki AS robot controllers
//!
//! Runs command batches, saves and loads programs over the controller's
//! Telnet console.

use anyhow::{bail, Context};
use asterm_core::cli::{print_exit_codes, CliResult};
use asterm_core::config::{AppConfig, LoggingConfig};
use asterm_core::{ProgramStore, Response, Session, SessionError, TelnetTransport, NAME, VERSION};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
}

/// asterm CLI
#[derive(Parser, Debug)]
#[command(
    name = "asterm",
    version,
    about = "Console client for Kawasaki AS robot controllers",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to the per-user config.toml)
    #[arg(short, long, global = true, env = "ASTERM_CONFIG")]
    config: Option<PathBuf>,

    /// Controller host
    #[arg(short = 'H', long, global = true, env = "ASTERM_HOST")]
    host: Option<String>,

    /// Controller console port
    #[arg(short, long, global = true, env = "ASTERM_PORT")]
    port: Option<u16>,

    /// Login credential
    #[arg(short, long, global = true, env = "ASTERM_LOGIN")]
    login: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run commands as one batch and print each response
    Exec {
        /// Console commands, in order
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Save a program from the controller
    Save {
        /// Program name on the controller
        program: String,

        /// Write the program here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a program file into the controller
    Load {
        /// Program file, relative to the program directory
        file: String,
    },

    /// Read commands from stdin, one batch per line
    Shell,

    /// Print the exit code table
    ExitCodes,
}

impl Cli {
    fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(host) = &self.host {
            config.controller.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.controller.port = port;
        }
        if let Some(login) = &self.login {
            config.controller.login.clone_from(login);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::ExitCodes) {
        print_exit_codes();
        return ExitCode::SUCCESS;
    }

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => cli.apply_overrides(config),
        Err(err) => return report(&CliResult::from(&err)),
    };

    let _guard = match init_logging(&cli, &config.logging) {
        Ok(guard) => guard,
        Err(err) => return report(&CliResult::from(&err)),
    };
    tracing::debug!("{} v{}", NAME, VERSION);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match run(&cli, &config, &cancel).await {
        Ok(()) => report(&CliResult::success()),
        Err(err) => report(&CliResult::from(&err)),
    }
}

fn report(result: &CliResult) -> ExitCode {
    if let Some(msg) = result.message() {
        eprintln!("Error: {msg}");
    }
    result.to_exit_code()
}

/// Install the stderr subscriber and, when configured, a file layer
///
/// `RUST_LOG` wins over the configured level and the verbosity flags.
fn init_logging(cli: &Cli, logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

async fn run(cli: &Cli, config: &AppConfig, cancel: &CancellationToken) -> anyhow::Result<()> {
    let transport = TelnetTransport::new(config.telnet_config());
    let mut session = Session::new(
        Box::new(transport),
        Box::new(config.program_store()),
        config.session_config(),
    );
    tracing::debug!("Session target {}", session.connection_info());

    match &cli.command {
        Commands::Exec { commands } => {
            let responses = session.send_cancellable(commands, cancel).await?;
            print_responses(cli, commands, &responses)?;
        }
        Commands::Save { program, output } => {
            let line = format!("save {program}");
            let responses = session.send_cancellable(&[line.as_str()], cancel).await?;
            match (responses.first(), output) {
                (Some(Response::Saved(saved)), Some(path)) => {
                    let name = path.to_string_lossy();
                    config
                        .program_store()
                        .write(&name, &saved.content)
                        .with_context(|| format!("Cannot write {name}"))?;
                    print_messages(cli, &saved.messages);
                    if !cli.quiet {
                        eprintln!("Saved {} bytes to {}", saved.content.len(), name);
                    }
                }
                (Some(_), None) => print_responses(cli, &[line], &responses)?,
                (other, _) => bail!("Unexpected response to {line}: {other:?}"),
            }
        }
        Commands::Load { file } => {
            let line = format!("load {file}");
            let responses = session.send_cancellable(&[line.as_str()], cancel).await?;
            print_responses(cli, &[line], &responses)?;
        }
        Commands::Shell => shell(cli, &mut session, cancel).await?,
        Commands::ExitCodes => print_exit_codes(),
    }

    Ok(())
}

/// Interactive loop; a failed batch is reported and the loop goes on
async fn shell(cli: &Cli, session: &mut Session, cancel: &CancellationToken) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if !cli.quiet {
            eprint!("{}> ", session.login());
            io::stderr().flush()?;
        }

        let line = tokio::select! {
            () = cancel.cancelled() => return Err(SessionError::Cancelled.into()),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match session.send_cancellable(&[line], cancel).await {
            Ok(responses) => print_responses(cli, &[line], &responses)?,
            Err(SessionError::Cancelled) => return Err(SessionError::Cancelled.into()),
            Err(err) => {
                tracing::debug!("Batch failed: {:?}", err);
                eprintln!("Error: {err}");
            }
        }
    }

    Ok(())
}

fn print_messages(cli: &Cli, messages: &[String]) {
    if cli.quiet {
        return;
    }
    for msg in messages {
        eprintln!("{msg}");
    }
}

fn print_responses<S: AsRef<str>>(
    cli: &Cli,
    commands: &[S],
    responses: &[Response],
) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();

    if cli.format == OutputFormat::Json {
        let json: Vec<serde_json::Value> = commands
            .iter()
            .zip(responses)
            .map(|(command, response)| response_json(command.as_ref(), response))
            .collect();
        writeln!(stdout, "{}", serde_json::to_string_pretty(&json)?)?;
        return Ok(());
    }

    for response in responses {
        match response {
            Response::Text(text) => write_text(&mut stdout, text)?,
            Response::Saved(saved) => {
                print_messages(cli, &saved.messages);
                stdout.write_all(&saved.content)?;
            }
            Response::Loaded(summary) => {
                print_messages(cli, &summary.messages);
                if !cli.quiet {
                    writeln!(
                        stdout,
                        "Loaded {} bytes in {} chunks ({} confirmations)",
                        summary.bytes, summary.chunks, summary.confirmations
                    )?;
                }
            }
        }
    }
    stdout.flush()?;
    Ok(())
}

fn write_text(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.is_empty() && !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn response_json(command: &str, response: &Response) -> serde_json::Value {
    match response {
        Response::Text(text) => json!({
            "command": command,
            "output": text,
        }),
        Response::Saved(saved) => json!({
            "command": command,
            "program": String::from_utf8_lossy(&saved.content),
            "bytes": saved.content.len(),
            "messages": saved.messages,
        }),
        Response::Loaded(summary) => json!({
            "command": command,
            "chunks": summary.chunks,
            "bytes": summary.bytes,
            "confirmations": summary.confirmations,
            "messages": summary.messages,
        }),
    }
}
