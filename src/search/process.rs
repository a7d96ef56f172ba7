//! ripgrep process lifecycle
//!
//! A `ProcessSession` owns one spawned `rg` process. Stdout is read in raw
//! chunks by a dedicated task and forwarded through a per-session channel, so
//! parsing happens on the consumer side. A second task owns the child and
//! kills it once the session's cancellation token fires.

use crate::error::SessionError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 8 * 1024;

/// Events produced by the stdout reader task.
#[derive(Debug)]
pub enum OutputEvent {
    /// Raw bytes as read from stdout; may split lines and characters
    Chunk(Vec<u8>),
    /// Reading stdout failed; no further events follow
    Error(SessionError),
    /// Stdout reached EOF
    End,
}

/// Kill switch for a running search process.
///
/// Cloning shares the same underlying token. Killing is idempotent and
/// killing a process that already exited does nothing.
#[derive(Debug, Clone, Default)]
pub struct ProcessHandle {
    token: CancellationToken,
}

impl ProcessHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill(&self) {
        if !self.token.is_cancelled() {
            log::debug!("Kill requested for ripgrep process");
        }
        self.token.cancel();
    }

    pub fn is_killed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `kill` has been called.
    pub async fn killed(&self) {
        self.token.cancelled().await
    }
}

/// One running ripgrep process and the receiving end of its output channel.
pub struct ProcessSession {
    handle: ProcessHandle,
    output: mpsc::UnboundedReceiver<OutputEvent>,
}

impl ProcessSession {
    /// Spawn `program` with `args`, wiring its lifetime to `handle`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(program: &Path, args: &[String], handle: ProcessHandle) -> Result<Self, SessionError> {
        log::debug!("Executing {} {:?}", program.display(), args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SessionError::Spawn)?;

        let mut stdout = child.stdout.take().ok_or(SessionError::StdoutNotAvailable)?;
        let (tx, output) = mpsc::unbounded_channel();

        let reader_token = handle.token.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                tokio::select! {
                    _ = reader_token.cancelled() => {
                        log::trace!("Reader stopped by cancellation");
                        break;
                    }
                    read = stdout.read(&mut buf) => {
                        match read {
                            Ok(0) => {
                                let _ = tx.send(OutputEvent::End);
                                break;
                            }
                            Ok(n) => {
                                if tx.send(OutputEvent::Chunk(buf[..n].to_vec())).is_err() {
                                    log::trace!("Output receiver dropped, stopping reader");
                                    break;
                                }
                            }
                            Err(e) => {
                                let _ = tx.send(OutputEvent::Error(SessionError::Read(e)));
                                break;
                            }
                        }
                    }
                }
            }
        });

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::warn!("ripgrep stderr: {}", line);
                }
            });
        }

        let waiter_token = handle.token.clone();
        tokio::spawn(async move {
            let killed = tokio::select! {
                _ = waiter_token.cancelled() => true,
                status = child.wait() => {
                    match status {
                        // Exit code 1 only means "no match"
                        Ok(status) => log::debug!("ripgrep exited with {}", status),
                        Err(e) => log::warn!("Failed to wait for ripgrep process: {}", e),
                    }
                    false
                }
            };

            if killed {
                log::info!("Terminating ripgrep process");
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill ripgrep process: {}", e);
                }
            }
        });

        Ok(Self { handle, output })
    }

    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Next stdout event; `None` once the reader task is gone.
    pub async fn next_event(&mut self) -> Option<OutputEvent> {
        self.output.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::time::timeout;

    fn sh(script: &str) -> (PathBuf, Vec<String>) {
        (PathBuf::from("sh"), vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_output_is_forwarded_then_end() {
        let (program, args) = sh("printf 'first\\nsecond\\n'");
        let mut session = ProcessSession::spawn(&program, &args, ProcessHandle::new()).unwrap();

        let mut collected = Vec::new();
        loop {
            match timeout(Duration::from_secs(5), session.next_event()).await.unwrap() {
                Some(OutputEvent::Chunk(bytes)) => collected.extend(bytes),
                Some(OutputEvent::End) => break,
                Some(OutputEvent::Error(e)) => panic!("unexpected error: {}", e),
                None => panic!("channel closed before End"),
            }
        }

        assert_eq!(collected, b"first\nsecond\n");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let program = PathBuf::from("/definitely/not/here/rg");
        let result = ProcessSession::spawn(&program, &[], ProcessHandle::new());

        match result {
            Err(SessionError::Spawn(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[tokio::test]
    async fn test_kill_is_idempotent_and_stops_output() {
        let (program, args) = sh("sleep 30");
        let handle = ProcessHandle::new();
        let mut session = ProcessSession::spawn(&program, &args, handle.clone()).unwrap();

        handle.kill();
        handle.kill();
        assert!(session.handle().is_killed());

        let event = timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("reader should stop after kill");
        assert!(matches!(event, None | Some(OutputEvent::End)));
    }

    #[tokio::test]
    async fn test_kill_after_exit_is_noop() {
        let (program, args) = sh("true");
        let handle = ProcessHandle::new();
        let mut session = ProcessSession::spawn(&program, &args, handle.clone()).unwrap();

        let event = timeout(Duration::from_secs(5), session.next_event()).await.unwrap();
        assert!(matches!(event, Some(OutputEvent::End)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.kill();
        assert!(handle.is_killed());
    }
}
