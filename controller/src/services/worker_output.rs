//! Helper to handle worker stdout/stderr output
//!
//! Worker output is piped and re-emitted as tracing events tagged with the
//! generation's port and version, so it shows up in the supervisor's log
//! stream instead of interleaving raw with it.

use std::process::Stdio;

use shared::{component_debug, component_info, component_warn, Component, Port, Version};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Configure stdio for a worker child process
pub fn configure_child_stdio(cmd: &mut Command) {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null());
}

/// Spawn tasks that consume the worker's piped output
///
/// The pipes must be drained until EOF or a chatty worker blocks on a full
/// buffer, and dies on a broken pipe if the read end goes away early.
pub fn spawn_output_forwarders(child: &mut Child, port: Port, version: Version) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, move |line| {
            component_info!(Component::Worker, port, version, "{}", line);
        }));
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, move |line| {
            component_warn!(Component::Worker, port, version, "{}", line);
        }));
    }
}

/// Emit every line of `reader` until EOF
///
/// Lines are split on raw bytes; invalid UTF-8 is replaced rather than
/// ending the stream.
pub(crate) async fn forward_lines<R, F>(reader: R, emit: F)
where
    R: AsyncRead + Unpin,
    F: Fn(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                emit(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                component_debug!(Component::Worker, "Worker output stream failed: {}", e);
                break;
            }
        }
    }
}
