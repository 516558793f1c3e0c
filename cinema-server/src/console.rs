//! Stdin action reader.
//!
//! Every non-empty line on stdin is one JSON action, for example
//! `{"action":"fader_increase_timer","rate":250}`. Lines that do not parse are
//! logged and skipped. End of input stops this subsystem only; the processor
//! service keeps running.

use cinema_core::Action;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::processor::{ProcessorHandle, ServiceError};

/// Parse one console line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Option<Result<Action, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Read actions from `input` and hand them to the service until end of input.
pub async fn read_actions<R>(
    input: R,
    handle: &ProcessorHandle,
    subsys: &SubsystemHandle,
) -> Result<(), ServiceError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => {
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    log::debug!("console: end of input");
                    return Ok(());
                };
                match parse_command(&line) {
                    None => {}
                    Some(Ok(action)) => match handle.execute(action).await {
                        // Action failures are logged by the service
                        Ok(()) | Err(ServiceError::Command(_)) => {}
                        Err(e) => return Err(e),
                    },
                    Some(Err(e)) => {
                        log::warn!("console: ignoring '{}': {}", line.trim(), e);
                    }
                }
            }
        }
    }
}

/// Subsystem entry point reading from the process's stdin
pub async fn run(handle: ProcessorHandle, subsys: SubsystemHandle) -> Result<(), ServiceError> {
    read_actions(tokio::io::stdin(), &handle, &subsys).await
}
