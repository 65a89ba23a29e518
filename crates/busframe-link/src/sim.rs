//! In-memory serial line that records what a transport does to it.

use crate::LinkError;
use crate::line::{SerialLine, SerialMode, SerialRts};
use crate::rtu::SerialParams;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// RTS mode changed; `level` is the output level the line was driven to.
    Rts {
        mode: SerialRts,
        level: bool,
        at: Instant,
    },
    Write {
        data: Vec<u8>,
        at: Instant,
    },
}

impl LineEvent {
    pub fn at(&self) -> Instant {
        match self {
            Self::Rts { at, .. } | Self::Write { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimSerialLine {
    mode: SerialMode,
    rts: SerialRts,
    rts_level: bool,
    rts_delay: u32,
    rts_supported: bool,
    readable: bool,
    fail_writes: bool,
    max_write: Option<usize>,
    written: Vec<u8>,
    events: Vec<LineEvent>,
}

impl SimSerialLine {
    /// A line reporting `rts_delay` microseconds as its default RTS delay.
    pub fn new(rts_delay: u32) -> Self {
        Self {
            mode: SerialMode::Rs232,
            rts: SerialRts::None,
            rts_level: true,
            rts_delay,
            rts_supported: true,
            readable: true,
            fail_writes: false,
            max_write: None,
            written: Vec::new(),
            events: Vec::new(),
        }
    }

    /// A line whose default RTS delay is one character time at `params`.
    pub fn for_params(params: &SerialParams) -> Self {
        Self::new(params.one_byte_time_micros())
    }

    /// RTS changes fail with [`LinkError::Unsupported`].
    pub fn without_rts(mut self) -> Self {
        self.rts_supported = false;
        self
    }

    /// Mode and RTS queries fail, as on a driver that cannot report them.
    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Writes fail with a broken-pipe I/O error.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Writes accept at most `max` bytes.
    pub fn with_write_limit(mut self, max: usize) -> Self {
        self.max_write = Some(max);
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn events(&self) -> &[LineEvent] {
        &self.events
    }

    pub fn rts_level(&self) -> bool {
        self.rts_level
    }

    pub fn clear(&mut self) {
        self.written.clear();
        self.events.clear();
    }

    fn unreadable_error() -> LinkError {
        LinkError::Io(std::io::Error::other("line state unavailable"))
    }
}

impl SerialLine for SimSerialLine {
    fn write_raw(&mut self, data: &[u8]) -> Result<usize, LinkError> {
        if self.fail_writes {
            return Err(LinkError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        let len = self.max_write.map_or(data.len(), |max| data.len().min(max));
        self.written.extend_from_slice(&data[..len]);
        self.events.push(LineEvent::Write {
            data: data[..len].to_vec(),
            at: Instant::now(),
        });
        Ok(len)
    }

    fn serial_mode(&self) -> Result<SerialMode, LinkError> {
        if !self.readable {
            return Err(Self::unreadable_error());
        }
        Ok(self.mode)
    }

    fn set_serial_mode(&mut self, mode: SerialMode) -> Result<(), LinkError> {
        self.mode = mode;
        Ok(())
    }

    fn rts(&self) -> Result<SerialRts, LinkError> {
        if !self.readable {
            return Err(Self::unreadable_error());
        }
        Ok(self.rts)
    }

    fn set_rts(&mut self, mode: SerialRts) -> Result<(), LinkError> {
        if !self.rts_supported {
            return Err(LinkError::Unsupported("rts toggle"));
        }
        self.rts = mode;
        self.rts_level = mode.idle_level();
        self.events.push(LineEvent::Rts {
            mode,
            level: self.rts_level,
            at: Instant::now(),
        });
        Ok(())
    }

    fn rts_delay(&self) -> Result<u32, LinkError> {
        Ok(self.rts_delay)
    }

    fn set_rts_delay(&mut self, micros: u32) -> Result<(), LinkError> {
        self.rts_delay = micros;
        Ok(())
    }
}
