//! Command exchange - send one console line, collect the full response.
//!
//! Handshake, as the firmware expects it:
//! 1. `COMMAND_BEGIN` announces a command
//! 2. `COMMAND_LINE` carries the text plus `\n`
//! 3. `POLL_STATUS` + `READ_CHUNK` repeat until a chunk comes back empty
//! 4. `EXCHANGE_END` closes the exchange
//!
//! Once step 1 has gone through, step 4 is always sent, also when a step in
//! between failed, so the firmware is never left waiting mid-exchange.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::events::{PongoEvent, PongoObserver};
use crate::protocol::{
    COMMAND_TERMINATOR, ControlRequest, MAX_CHUNK_SIZE, MAX_COMMAND_LEN, POLL_STATUS_LEN,
    decode_chunk,
};
use crate::transport::ControlChannel;

/// Reject commands the firmware buffer cannot hold.
pub fn validate_command(command: &str) -> Result<()> {
    let length = command.chars().count();
    if length > MAX_COMMAND_LEN {
        return Err(Error::InvalidCommand {
            length,
            max: MAX_COMMAND_LEN,
        });
    }
    Ok(())
}

/// Send `command` and return the console output.
///
/// Returns `Ok(None)` when the device produced no output at all. If any
/// transfer fails the whole response is discarded; pongoOS cannot resume
/// a partially read response.
#[instrument(level = "debug", skip(channel, observer), fields(len = command.len()))]
pub fn send_command<C>(
    channel: &C,
    command: &str,
    timeout: Duration,
    observer: &dyn PongoObserver,
) -> Result<Option<String>>
where
    C: ControlChannel + ?Sized,
{
    validate_command(command)?;

    channel.control_out(ControlRequest::COMMAND_BEGIN, &[], timeout)?;

    let body = run_exchange(channel, command, timeout, observer);
    let closed = channel.control_out(ControlRequest::EXCHANGE_END, &[], timeout);

    let output = match (body, closed) {
        (Ok(output), Ok(_)) => output,
        (Ok(_), Err(e)) => return Err(e.into()),
        (Err(e), Ok(_)) => return Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Closing transfer failed after exchange error");
            return Err(e);
        }
    };

    observer.on_event(&PongoEvent::ExchangeComplete {
        bytes: output.len(),
    });

    if output.is_empty() {
        Ok(None)
    } else {
        Ok(Some(output))
    }
}

fn run_exchange<C>(
    channel: &C,
    command: &str,
    timeout: Duration,
    observer: &dyn PongoObserver,
) -> Result<String>
where
    C: ControlChannel + ?Sized,
{
    let mut line = String::with_capacity(command.len() + 1);
    line.push_str(command);
    line.push(COMMAND_TERMINATOR);
    channel.control_out(ControlRequest::COMMAND_LINE, line.as_bytes(), timeout)?;

    observer.on_event(&PongoEvent::CommandSent {
        command: command.to_owned(),
    });

    let mut output = String::new();
    loop {
        channel.control_in(ControlRequest::POLL_STATUS, POLL_STATUS_LEN, timeout)?;
        let chunk = channel.control_in(ControlRequest::READ_CHUNK, MAX_CHUNK_SIZE, timeout)?;
        if chunk.is_empty() {
            break;
        }

        debug!(len = chunk.len(), "Received console chunk");
        observer.on_event(&PongoEvent::ChunkReceived {
            length: chunk.len(),
        });
        output.push_str(&decode_chunk(&chunk));
    }

    Ok(output)
}
