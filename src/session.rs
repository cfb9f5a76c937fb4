//! Interactive session
//!
//! Wires the configured backend, the status cache and the command pipeline
//! together and runs the read, parse, execute, print loop. One command runs
//! at a time. An interrupt cancels the running command, or ends the session
//! when the prompt is idle.

use cncterm_commands::{CommandExecutionResult, CommandExecutor, CommandParser, CommandRegistry};
use cncterm_communication::{MachineSimulator, StatusCache, Transport, VirtualTransport};
use cncterm_core::Error;
use cncterm_settings::{Config, TransportKind};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// ANSI sequence that clears the screen and homes the cursor
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// A running terminal session
pub struct Session {
    config: Config,
    transport: Arc<dyn Transport>,
    parser: CommandParser,
    executor: CommandExecutor,
    status_cache: StatusCache,
    shutdown: CancellationToken,
    status_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Build a session from configuration and start following machine status.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        let transport: Arc<dyn Transport> = match config.transport.kind {
            TransportKind::Virtual => Arc::new(VirtualTransport::new(
                MachineSimulator::new(&config.machine),
                Duration::from_millis(config.transport.status_interval_ms),
            )),
        };
        tracing::info!("Using {} transport", transport.name());

        let registry = Arc::new(CommandRegistry::from_settings(&config.commands)?);
        let status_cache = StatusCache::new();
        let shutdown = CancellationToken::new();
        let status_task = status_cache.spawn(
            transport.clone(),
            &config.transport.status_endpoint,
            shutdown.child_token(),
        );

        let executor = CommandExecutor::new(registry.clone(), transport.clone())
            .with_timeout(Duration::from_millis(config.transport.timeout_ms))
            .with_status_cache(status_cache.clone());

        Ok(Self {
            parser: CommandParser::new(registry),
            executor,
            transport,
            status_cache,
            shutdown,
            status_task: Some(status_task),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn status_cache(&self) -> &StatusCache {
        &self.status_cache
    }

    /// Parse and execute one line; `None` for blank input
    pub async fn handle_line(
        &self,
        line: &str,
        cancel: &CancellationToken,
    ) -> Option<CommandExecutionResult> {
        let parsed = self.parser.parse(line)?;
        Some(self.executor.execute(&parsed, cancel).await)
    }

    /// Run the interactive loop on the process's Ctrl-C signal
    pub async fn run<R, W>(&mut self, input: R, output: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, rx) = mpsc::channel(4);
        let forward = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        let result = self.run_with_interrupts(input, output, rx).await;
        forward.abort();
        result
    }

    /// Run the interactive loop until end of input, `/exit` or an idle interrupt
    pub async fn run_with_interrupts<R, W>(
        &mut self,
        input: R,
        mut output: W,
        mut interrupts: mpsc::Receiver<()>,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let banner = format!(
            "{} {}\n{}\n",
            self.config.app.name,
            crate::VERSION,
            self.config.app.welcome
        );
        output.write_all(banner.as_bytes()).await?;

        loop {
            output.write_all(self.config.app.prompt.as_bytes()).await?;
            output.flush().await?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                Some(()) = interrupts.recv() => {
                    tracing::info!("Interrupted at prompt");
                    output.write_all(b"\n").await?;
                    break;
                }
            };
            let Some(line) = line else {
                break;
            };
            let Some(parsed) = self.parser.parse(&line) else {
                continue;
            };

            let cancel = self.shutdown.child_token();
            let execution = self.executor.execute(&parsed, &cancel);
            tokio::pin!(execution);
            let result = loop {
                tokio::select! {
                    result = &mut execution => break result,
                    Some(()) = interrupts.recv() => {
                        tracing::info!("Cancelling {}", parsed.name);
                        cancel.cancel();
                    }
                }
            };

            write_result(&mut output, &result).await?;
            if result.should_exit {
                break;
            }
        }

        output.flush().await?;
        self.stop().await;
        Ok(())
    }

    /// Stop background tasks
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.status_task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Status task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn write_result<W>(output: &mut W, result: &CommandExecutionResult) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if result.should_clear {
        output.write_all(CLEAR_SCREEN.as_bytes()).await?;
    }
    let text = if result.cancelled {
        "Cancelled".to_string()
    } else if result.success {
        result.output.clone()
    } else {
        format!("Error: {}", result.output)
    };
    if !text.is_empty() {
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    Ok(())
}
