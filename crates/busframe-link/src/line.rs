use crate::LinkError;
use std::fmt;

/// Electrical mode of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialMode {
    Rs232,
    Rs485,
    /// The line could not report its mode.
    Unknown,
}

impl fmt::Display for SerialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rs232 => f.write_str("rs232"),
            Self::Rs485 => f.write_str("rs485"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// RTS direction-control mode.
///
/// `Up` and `Down` name the level RTS takes while transmitting; the line
/// rests at the opposite level so the bus is not reserved when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialRts {
    /// No RTS-based direction control.
    None,
    Up,
    Down,
    /// The line could not report its RTS mode.
    Unknown,
}

impl SerialRts {
    /// Level the physical RTS output rests at under this mode.
    pub const fn idle_level(self) -> bool {
        !matches!(self, Self::Up)
    }

    /// Mode with the active level swapped, used to open the transmit window.
    pub const fn complement(self) -> Self {
        match self {
            Self::Down => Self::Up,
            _ => Self::Down,
        }
    }
}

impl fmt::Display for SerialRts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Serial channel driven by [`crate::RtuLayer`].
///
/// The line owns the native handle and its line-control settings. Setters
/// never receive the `Unknown` sentinels; the layer rejects them first.
pub trait SerialLine: Send {
    /// Writes raw bytes, returning how many the driver accepted.
    fn write_raw(&mut self, data: &[u8]) -> Result<usize, LinkError>;

    fn serial_mode(&self) -> Result<SerialMode, LinkError>;

    fn set_serial_mode(&mut self, mode: SerialMode) -> Result<(), LinkError>;

    fn rts(&self) -> Result<SerialRts, LinkError>;

    /// Stores `mode` and drives the RTS output to its idle level.
    fn set_rts(&mut self, mode: SerialRts) -> Result<(), LinkError>;

    /// Guard time in microseconds observed around RTS toggles.
    fn rts_delay(&self) -> Result<u32, LinkError>;

    fn set_rts_delay(&mut self, micros: u32) -> Result<(), LinkError>;
}

impl<L: SerialLine + ?Sized> SerialLine for Box<L> {
    fn write_raw(&mut self, data: &[u8]) -> Result<usize, LinkError> {
        (**self).write_raw(data)
    }

    fn serial_mode(&self) -> Result<SerialMode, LinkError> {
        (**self).serial_mode()
    }

    fn set_serial_mode(&mut self, mode: SerialMode) -> Result<(), LinkError> {
        (**self).set_serial_mode(mode)
    }

    fn rts(&self) -> Result<SerialRts, LinkError> {
        (**self).rts()
    }

    fn set_rts(&mut self, mode: SerialRts) -> Result<(), LinkError> {
        (**self).set_rts(mode)
    }

    fn rts_delay(&self) -> Result<u32, LinkError> {
        (**self).rts_delay()
    }

    fn set_rts_delay(&mut self, micros: u32) -> Result<(), LinkError> {
        (**self).set_rts_delay(micros)
    }
}
