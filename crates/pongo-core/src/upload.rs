//! Data upload - push a raw blob to pongoOS over bulk.

use std::time::Duration;

use tracing::{instrument, warn};

use crate::error::Result;
use crate::events::{PongoEvent, PongoObserver};
use crate::protocol::{BULK_OUT_ENDPOINT, ControlRequest, UPLOAD_BEGIN_LEN};
use crate::transport::ControlChannel;

/// Upload `data` to the device.
///
/// Sequence: `UPLOAD_BEGIN` with four zero bytes, one bulk write of the
/// whole payload to endpoint 2, then `EXCHANGE_END`. The payload is not
/// split here.
///
/// `UPLOAD_BEGIN` can crash a running pongoOS session. It is kept because
/// the firmware's upload path has only been verified with it in place.
#[instrument(level = "debug", skip(channel, data, observer), fields(len = data.len()))]
pub fn send_data<C>(
    channel: &C,
    data: &[u8],
    timeout: Duration,
    observer: &dyn PongoObserver,
) -> Result<()>
where
    C: ControlChannel + ?Sized,
{
    warn!("Sending upload setup request; pongoOS may become unstable");
    channel.control_out(ControlRequest::UPLOAD_BEGIN, &[0u8; UPLOAD_BEGIN_LEN], timeout)?;
    channel.bulk_write(BULK_OUT_ENDPOINT, data, timeout)?;
    channel.control_out(ControlRequest::EXCHANGE_END, &[], timeout)?;

    observer.on_event(&PongoEvent::DataUploaded { length: data.len() });
    Ok(())
}
