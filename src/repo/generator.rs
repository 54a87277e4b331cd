// src/repo/generator.rs

//! Bounded execution of external metadata generators
//!
//! Both output pipes are drained on their own threads while the parent
//! waits with a timeout, so neither a full pipe nor a process that keeps
//! its pipes open can wedge a refresh. On expiry the child is killed and
//! reaped.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;
use wait_timeout::ChildExt;

pub(crate) struct GeneratorOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Run `cmd` to completion within `timeout`, capturing both outputs.
/// A timeout kills the child and surfaces [`Error::Generator`]; a
/// non-zero exit is left for the caller, which knows what the output
/// means.
pub(crate) fn run(mut cmd: Command, timeout: Duration) -> Result<GeneratorOutput> {
    let name = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::io(format!("spawn {}", name), e))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child
        .wait_timeout(timeout)
        .map_err(|e| Error::io(format!("wait for {}", name), e))?
    {
        Some(status) => status,
        None => {
            warn!(generator = %name, "timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Generator(format!(
                "{} timed out after {:?}",
                name, timeout
            )));
        }
    };

    Ok(GeneratorOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        status,
    })
}
