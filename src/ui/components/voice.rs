use std::io;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// External capture process streaming audio into the composer's recorder.
pub struct VoiceCapture {
    child: Child,
    reader: JoinHandle<()>,
}

impl VoiceCapture {
    /// Spawn `command` and forward everything it writes to stdout as chunks.
    pub fn start(command: &[String], chunks: mpsc::UnboundedSender<Vec<u8>>) -> io::Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "recorder command is empty")
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("recorder has no stdout"))?;

        let reader = tokio::spawn(async move {
            let mut buffer = vec![0u8; 8192];
            loop {
                match stdout.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(read) => {
                        if chunks.send(buffer[..read].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        log::warn!("Voice capture read failed: {err}");
                        break;
                    }
                }
            }
        });

        log::info!("Voice capture started with `{program}`");
        Ok(Self { child, reader })
    }

    /// Stop the process and wait until its output has been forwarded.
    pub async fn stop(mut self) -> io::Result<()> {
        if let Err(err) = self.child.kill().await {
            if err.kind() != io::ErrorKind::InvalidInput {
                return Err(err);
            }
        }
        if let Err(err) = self.reader.await {
            log::debug!("Voice reader ended abnormally: {err}");
        }
        log::info!("Voice capture stopped");
        Ok(())
    }
}
