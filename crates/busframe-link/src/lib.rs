//! Blocking RTU and RTU-over-TCP transports.
//!
//! A [`NetLayer`] finalizes frames (checksum append), validates received
//! frames and puts raw ADU bytes on its channel. [`RtuLayer`] drives a serial
//! line with optional RTS half-duplex direction control; [`EncLayer`] carries
//! the same checksum-framed ADUs over a TCP stream.

#![forbid(unsafe_code)]

use busframe_core::frame::rtu as rtu_frame;
use busframe_core::{Message, Net};
use thiserror::Error;
use tracing::trace;

pub mod enc;
pub mod line;
pub mod rtu;
pub mod sim;
#[cfg(feature = "rtu")]
pub mod native;

pub use enc::{EncConfig, EncLayer};
pub use line::{SerialLine, SerialMode, SerialRts};
pub use rtu::{RtuConfig, RtuLayer, SerialParams, baud, parity, stop_bits};
pub use sim::{LineEvent, SimSerialLine};
#[cfg(feature = "rtu")]
pub use native::{NativeRtuLayer, NativeSerialLine};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("unable to open {net} backend ({connection}, {settings}): {reason}")]
    Open {
        net: Net,
        connection: String,
        settings: String,
        reason: String,
    },
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not connected")]
    NotConnected,
    #[error("invalid mode: {0}")]
    InvalidMode(&'static str),
}

impl LinkError {
    pub(crate) fn open(
        net: Net,
        connection: &str,
        settings: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Open {
            net,
            connection: connection.to_owned(),
            settings: settings.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Transport contract shared by every byte-oriented backend.
pub trait NetLayer {
    /// Network kind this transport frames messages for.
    fn net(&self) -> Net;

    /// Physical endpoint: device path or host.
    fn connection(&self) -> &str;

    /// Backend settings string: `"19200E1"` for serial, the port for ENC.
    fn settings(&self) -> &str;

    /// Appends the checksum to `msg` and grows its ADU by two bytes.
    ///
    /// Returns `false` without touching `msg` when it is tagged for another
    /// network kind, has nothing after the slave address, or has no room left.
    fn prepare_to_send(&self, msg: &mut Message) -> bool {
        if msg.net() != self.net() || msg.is_empty() {
            return false;
        }
        match rtu_frame::append_crc(msg) {
            Ok(()) => {
                trace!(net = %self.net(), adu_size = msg.adu_size(), "frame prepared");
                true
            }
            Err(_) => false,
        }
    }

    /// Checks the trailing checksum of a received frame.
    fn check_message(&self, msg: &Message) -> bool {
        rtu_frame::check_crc(msg)
    }

    /// Writes the valid ADU bytes of `msg` to the channel.
    ///
    /// Returns the byte count the channel reported. No retry is attempted.
    fn send_raw_message(&mut self, msg: &Message) -> Result<usize, LinkError>;
}

impl<T: NetLayer + ?Sized> NetLayer for Box<T> {
    fn net(&self) -> Net {
        (**self).net()
    }

    fn connection(&self) -> &str {
        (**self).connection()
    }

    fn settings(&self) -> &str {
        (**self).settings()
    }

    fn prepare_to_send(&self, msg: &mut Message) -> bool {
        (**self).prepare_to_send(msg)
    }

    fn check_message(&self, msg: &Message) -> bool {
        (**self).check_message(msg)
    }

    fn send_raw_message(&mut self, msg: &Message) -> Result<usize, LinkError> {
        (**self).send_raw_message(msg)
    }
}
