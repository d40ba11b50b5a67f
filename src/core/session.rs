//! Session engine for the controller console
//!
//! A [`Session`] owns the transport and runs batches of commands against it.
//! Every batch connects and logs in, executes its commands in order and
//! disconnects again, whether it succeeded or not.

use super::command::{Command, CommandError, LineEnding};
use super::reader::{ReadError, StreamReader};
use super::store::ProgramStore;
use super::transfer::{self, frame::PROMPT, LoadSummary, SavedProgram, TransferError};
use super::transport::{TransportError, TransportTrait};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,
    /// Transport open, login not confirmed yet
    Connected,
    /// Prompt seen after login, commands can be sent
    LoggedIn,
}

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The transport could not connect
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] TransportError),

    /// The prompt never appeared after the login was sent
    #[error("Login failed: {0}")]
    LoginFailed(#[source] ReadError),

    /// The channel ended while a response was still expected
    #[error("Protocol desync: channel closed during {stage}")]
    ProtocolDesync {
        /// Exchange step that was running
        stage: &'static str,
    },

    /// A file to load could not be read
    #[error("Cannot read {name}: {source}")]
    FileAccess {
        /// File name as given in the command
        name: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed transfer command
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] CommandError),

    /// The batch was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// No data arrived within the idle timeout
    #[error("Timed out after {0:?} without data")]
    Timeout(Duration),

    /// Any other channel failure
    #[error("Channel error during {stage}: {source}")]
    Channel {
        /// Exchange step that was running
        stage: &'static str,
        /// Underlying failure
        #[source]
        source: ReadError,
    },
}

impl SessionError {
    fn from_read(stage: &'static str, err: ReadError) -> Self {
        match err {
            ReadError::Cancelled => Self::Cancelled,
            ReadError::IdleTimeout(limit) => Self::Timeout(limit),
            err if err.is_end_of_stream() => Self::ProtocolDesync { stage },
            source => Self::Channel { stage, source },
        }
    }

    fn from_transfer(err: TransferError) -> Self {
        let stage = err.stage();
        Self::from_read(stage, err.into_read_error())
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Login credential sent right after connecting
    pub login: String,
    /// Line ending appended to the login and every command
    pub line_ending: LineEnding,
    /// Give up when no byte arrives for this long (`None` waits forever)
    pub idle_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Create a configuration with the given login
    pub fn new(login: &str) -> Self {
        Self {
            login: login.to_string(),
            line_ending: LineEnding::default(),
            idle_timeout: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("as")
    }
}

/// Response to one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Console output up to the prompt
    Text(String),
    /// Program received with `save`
    Saved(SavedProgram),
    /// Result of `load`
    Loaded(LoadSummary),
}

impl Response {
    /// Text form of the response
    ///
    /// A saved program is decoded lossily; a load has no text.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Saved(program) => String::from_utf8_lossy(&program.content),
            Self::Loaded(_) => Cow::Borrowed(""),
        }
    }
}

fn open_reader<'a>(
    transport: &'a mut dyn TransportTrait,
    config: &SessionConfig,
    cancel: &CancellationToken,
) -> StreamReader<'a> {
    StreamReader::new(transport, cancel.clone())
        .idle_timeout(config.idle_timeout)
        .line_ending(config.line_ending)
}

/// Console session with a controller
pub struct Session {
    transport: Box<dyn TransportTrait>,
    store: Box<dyn ProgramStore>,
    config: SessionConfig,
    state: SessionState,
}

impl Session {
    /// Create a session; nothing is connected until the first batch
    pub fn new(
        transport: Box<dyn TransportTrait>,
        store: Box<dyn ProgramStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            store,
            config,
            state: SessionState::Disconnected,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Login credential
    pub fn login(&self) -> &str {
        &self.config.login
    }

    /// Get connection info string
    pub fn connection_info(&self) -> String {
        self.transport.connection_info()
    }

    /// Run one batch and return one response per command, in order
    pub async fn send<S: AsRef<str>>(
        &mut self,
        commands: &[S],
    ) -> Result<Vec<Response>, SessionError> {
        self.send_cancellable(commands, &CancellationToken::new()).await
    }

    /// Like [`send`](Self::send), aborting when `cancel` fires
    ///
    /// The first failing command ends the batch; the connection is closed on
    /// every path.
    pub async fn send_cancellable<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        cancel: &CancellationToken,
    ) -> Result<Vec<Response>, SessionError> {
        let result = self.run_batch(commands, cancel).await;
        self.close().await;
        result
    }

    /// Run a single command
    pub async fn get_response(&mut self, command: &str) -> Result<Response, SessionError> {
        let mut responses = self.send(&[command]).await?;
        Ok(responses.remove(0))
    }

    async fn run_batch<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        cancel: &CancellationToken,
    ) -> Result<Vec<Response>, SessionError> {
        if !self.transport.is_connected() {
            self.connect(cancel).await?;
        }

        let mut responses = Vec::with_capacity(commands.len());
        for line in commands {
            let command = Command::parse(line.as_ref())?;
            responses.push(self.execute(&command, cancel).await?);
        }
        Ok(responses)
    }

    async fn connect(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.transport
            .connect()
            .await
            .map_err(SessionError::ConnectionFailed)?;
        self.state = SessionState::Connected;

        let mut reader = open_reader(self.transport.as_mut(), &self.config, cancel);
        reader
            .write_line(&self.config.login)
            .await
            .map_err(SessionError::LoginFailed)?;
        tracing::debug!("Login sent");

        let banner = reader.read_until(&[PROMPT]).await.map_err(|e| match e {
            ReadError::Cancelled => SessionError::Cancelled,
            e => SessionError::LoginFailed(e),
        })?;
        tracing::debug!("Banner: {}", String::from_utf8_lossy(&banner).trim());

        self.state = SessionState::LoggedIn;
        tracing::info!("Logged in to {}", self.transport.connection_info());
        Ok(())
    }

    async fn execute(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<Response, SessionError> {
        // Read the file before anything is written so a bad name leaves the
        // controller untouched
        let content = match command {
            Command::Load { file, .. } => {
                let content = self.store.read(file).map_err(|source| SessionError::FileAccess {
                    name: file.clone(),
                    source,
                })?;
                Some(content)
            }
            _ => None,
        };

        let mut reader = open_reader(self.transport.as_mut(), &self.config, cancel);

        let discarded = reader
            .discard_pending()
            .await
            .map_err(|e| SessionError::from_read("discard", e))?;
        if discarded > 0 {
            tracing::debug!("Discarded {} stale bytes", discarded);
        }

        tracing::debug!("Sending command: {}", command.line());
        reader
            .write_line(command.line())
            .await
            .map_err(|e| SessionError::from_read("command", e))?;

        let response = match command {
            Command::Plain(_) => {
                let output = reader
                    .read_until(&[PROMPT])
                    .await
                    .map_err(|e| SessionError::from_read("response", e))?;
                Response::Text(String::from_utf8_lossy(&output).into_owned())
            }
            Command::Save(_) => Response::Saved(
                transfer::save(&mut reader)
                    .await
                    .map_err(SessionError::from_transfer)?,
            ),
            Command::Load { .. } => Response::Loaded(
                transfer::load(&mut reader, content.as_deref().unwrap_or_default())
                    .await
                    .map_err(SessionError::from_transfer)?,
            ),
        };

        tracing::debug!("Response read");
        Ok(response)
    }

    async fn close(&mut self) {
        if self.transport.is_connected() {
            if let Err(e) = self.transport.disconnect().await {
                tracing::warn!(
                    "Error disconnecting from {}: {}",
                    self.transport.connection_info(),
                    e
                );
            }
        }
        self.state = SessionState::Disconnected;
    }
}
