use crate::line::{SerialLine, SerialMode, SerialRts};
use crate::{LinkError, NetLayer};
use busframe_core::{Message, Net};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const DEFAULT_BAUD: u32 = 19_200;
pub const DEFAULT_PARITY: char = 'N';
/// RTU frames are always 8 data bits.
pub const DATA_BITS: u8 = 8;

/// Baud rate: the leading integer of `settings`, or 19200 when there is none.
///
/// Leading whitespace and a `+` sign are accepted; anything from the first
/// non-digit on is ignored. Values that do not fit an `i32` are rejected.
pub fn baud(settings: &str) -> u32 {
    let s = settings.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s[..end]
        .parse::<i32>()
        .ok()
        .and_then(|baud| u32::try_from(baud).ok())
        .unwrap_or(DEFAULT_BAUD)
}

/// Parity: the second-to-last character when it is `E` or `O`, else `N`.
pub fn parity(settings: &str) -> char {
    let bytes = settings.as_bytes();
    match bytes.len().checked_sub(2).map(|i| bytes[i]) {
        Some(c @ (b'E' | b'O')) => char::from(c),
        _ => DEFAULT_PARITY,
    }
}

/// Stop bits: 2 without parity, 1 with parity.
pub fn stop_bits(settings: &str) -> u8 {
    if parity(settings) == 'N' { 2 } else { 1 }
}

/// Serial parameters derived from a settings string such as `"19200E1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialParams {
    pub baud: u32,
    pub parity: char,
    pub data_bits: u8,
    pub stop_bits: u8,
}

impl SerialParams {
    pub fn from_settings(settings: &str) -> Self {
        Self {
            baud: baud(settings),
            parity: parity(settings),
            data_bits: DATA_BITS,
            stop_bits: stop_bits(settings),
        }
    }

    /// Bits on the wire per character: start, data, parity and stop bits.
    pub fn bits_per_char(&self) -> u32 {
        let parity_bit = u32::from(self.parity != 'N');
        1 + u32::from(self.data_bits) + parity_bit + u32::from(self.stop_bits)
    }

    /// Time to shift one character out at this baud rate, in microseconds.
    ///
    /// Zero when the baud rate is zero.
    pub fn one_byte_time_micros(&self) -> u32 {
        let micros = 1_000_000u64 * u64::from(self.bits_per_char());
        micros
            .checked_div(u64::from(self.baud))
            .map_or(0, |t| u32::try_from(t).unwrap_or(u32::MAX))
    }
}

impl fmt::Display for SerialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}{}{}",
            self.baud, self.data_bits, self.parity, self.stop_bits
        )
    }
}

/// Line-control settings applied when an [`RtuLayer`] is opened.
#[derive(Debug, Clone)]
pub struct RtuConfig {
    /// Read/write timeout of the native channel.
    pub timeout: Duration,
    pub serial_mode: Option<SerialMode>,
    pub rts: Option<SerialRts>,
    pub rts_delay: Option<u32>,
}

impl Default for RtuConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            serial_mode: None,
            rts: None,
            rts_delay: None,
        }
    }
}

impl RtuConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_serial_mode(mut self, mode: SerialMode) -> Self {
        self.serial_mode = Some(mode);
        self
    }

    pub fn with_rts(mut self, rts: SerialRts) -> Self {
        self.rts = Some(rts);
        self
    }

    pub fn with_rts_delay(mut self, micros: u32) -> Self {
        self.rts_delay = Some(micros);
        self
    }
}

/// Modbus RTU transport over a serial line.
///
/// With an RTS mode other than [`SerialRts::None`], every send opens a
/// transmit window by switching RTS, writes the ADU, waits for the last
/// character to leave the UART, then switches RTS back.
#[derive(Debug)]
pub struct RtuLayer<L> {
    port: String,
    settings: String,
    line: L,
    one_byte_time: u32,
}

impl<L: SerialLine> RtuLayer<L> {
    /// Wraps an already-open line.
    ///
    /// The line's current RTS delay is kept as the per-byte time used to
    /// hold the transmit window open.
    pub fn with_line(
        port: impl Into<String>,
        settings: impl Into<String>,
        line: L,
    ) -> Result<Self, LinkError> {
        let port = port.into();
        let settings = settings.into();
        let one_byte_time = line
            .rts_delay()
            .map_err(|err| LinkError::open(Net::Rtu, &port, &settings, err))?;

        debug!(
            port = %port,
            settings = %settings,
            params = %SerialParams::from_settings(&settings),
            one_byte_time,
            "rtu layer ready"
        );
        Ok(Self {
            port,
            settings,
            line,
            one_byte_time,
        })
    }

    /// Wraps an open line, then applies the line-control overrides of `config`.
    pub fn with_line_config(
        port: impl Into<String>,
        settings: impl Into<String>,
        line: L,
        config: &RtuConfig,
    ) -> Result<Self, LinkError> {
        let mut layer = Self::with_line(port, settings, line)?;
        if let Some(mode) = config.serial_mode {
            layer.set_serial_mode(mode)?;
        }
        if let Some(micros) = config.rts_delay {
            layer.set_rts_delay(micros)?;
        }
        if let Some(rts) = config.rts {
            layer.set_rts(rts)?;
        }
        Ok(layer)
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        baud(&self.settings)
    }

    pub fn parity(&self) -> char {
        parity(&self.settings)
    }

    pub fn stop_bits(&self) -> u8 {
        stop_bits(&self.settings)
    }

    pub fn serial_params(&self) -> SerialParams {
        SerialParams::from_settings(&self.settings)
    }

    /// Per-byte hold time in microseconds, fixed when the layer was built.
    pub fn one_byte_time(&self) -> u32 {
        self.one_byte_time
    }

    pub fn serial_mode(&self) -> SerialMode {
        self.line.serial_mode().unwrap_or_else(|err| {
            warn!(port = %self.port, error = %err, "serial mode unavailable");
            SerialMode::Unknown
        })
    }

    pub fn set_serial_mode(&mut self, mode: SerialMode) -> Result<(), LinkError> {
        if mode == SerialMode::Unknown {
            return Err(LinkError::InvalidMode("serial mode must be rs232 or rs485"));
        }
        self.line.set_serial_mode(mode)?;
        debug!(port = %self.port, %mode, "serial mode set");
        Ok(())
    }

    pub fn rts(&self) -> SerialRts {
        self.line.rts().unwrap_or_else(|err| {
            warn!(port = %self.port, error = %err, "rts mode unavailable");
            SerialRts::Unknown
        })
    }

    pub fn set_rts(&mut self, rts: SerialRts) -> Result<(), LinkError> {
        if rts == SerialRts::Unknown {
            return Err(LinkError::InvalidMode("rts mode must be none, up or down"));
        }
        self.line.set_rts(rts)?;
        debug!(port = %self.port, %rts, "rts mode set");
        Ok(())
    }

    pub fn rts_delay(&self) -> Result<u32, LinkError> {
        self.line.rts_delay()
    }

    pub fn set_rts_delay(&mut self, micros: u32) -> Result<(), LinkError> {
        self.line.set_rts_delay(micros)?;
        debug!(port = %self.port, micros, "rts delay set");
        Ok(())
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    pub fn into_line(self) -> L {
        self.line
    }

    fn send_with_rts(&mut self, rts: SerialRts, adu: &[u8]) -> Result<usize, LinkError> {
        let delay = self.line.rts_delay()?;

        self.line.set_rts(rts.complement())?;
        sleep_micros(u64::from(delay));

        let written = self.line.write_raw(adu);

        let hold = u64::from(self.one_byte_time) * adu.len() as u64 + u64::from(delay);
        sleep_micros(hold);
        let restored = self.line.set_rts(rts);

        let written = written?;
        if let Err(err) = restored {
            warn!(port = %self.port, %rts, error = %err, "failed to restore rts");
            return Err(err);
        }
        trace!(port = %self.port, written, delay, hold, "rtu frame sent with rts control");
        Ok(written)
    }
}

impl<L: SerialLine> NetLayer for RtuLayer<L> {
    fn net(&self) -> Net {
        Net::Rtu
    }

    fn connection(&self) -> &str {
        &self.port
    }

    fn settings(&self) -> &str {
        &self.settings
    }

    fn send_raw_message(&mut self, msg: &Message) -> Result<usize, LinkError> {
        match self.rts() {
            SerialRts::None => {
                let written = self.line.write_raw(msg.adu())?;
                trace!(port = %self.port, written, "rtu frame sent");
                Ok(written)
            }
            SerialRts::Unknown => Err(LinkError::Unsupported("rts direction control")),
            rts => self.send_with_rts(rts, msg.adu()),
        }
    }
}

fn sleep_micros(micros: u64) {
    if micros > 0 {
        std::thread::sleep(Duration::from_micros(micros));
    }
}

#[cfg(test)]
mod tests {
    use super::{SerialParams, baud, parity, stop_bits};

    #[test]
    fn parses_parity_settings() {
        assert_eq!(baud("19200E1"), 19200);
        assert_eq!(parity("19200E1"), 'E');
        assert_eq!(stop_bits("19200E1"), 1);

        assert_eq!(baud("38400O1"), 38400);
        assert_eq!(parity("38400O1"), 'O');
        assert_eq!(stop_bits("38400O1"), 1);
    }

    #[test]
    fn bare_baud_means_no_parity_two_stop_bits() {
        assert_eq!(baud("9600"), 9600);
        assert_eq!(parity("9600"), 'N');
        assert_eq!(stop_bits("9600"), 2);

        assert_eq!(baud("19200N2"), 19200);
        assert_eq!(parity("19200N2"), 'N');
        assert_eq!(stop_bits("19200N2"), 2);
    }

    #[test]
    fn unparsable_baud_defaults() {
        assert_eq!(baud("garbage"), 19200);
        assert_eq!(baud(""), 19200);
        assert_eq!(baud("-9600"), 19200);
        assert_eq!(baud("99999999999"), 19200);
        assert_eq!(baud(" +115200E1"), 115200);
        assert_eq!(baud("2147483647"), 2_147_483_647);
        assert_eq!(baud("2147483648E1"), 19200);
        assert_eq!(baud("3000000000"), 19200);
    }

    #[test]
    fn parity_only_from_second_to_last_char() {
        assert_eq!(parity(""), 'N');
        assert_eq!(parity("E"), 'N');
        assert_eq!(parity("E1"), 'E');
        assert_eq!(parity("19200E"), 'N');
        assert_eq!(parity("19200e1"), 'N');
        assert_eq!(parity("19200É1"), 'N');
    }

    #[test]
    fn one_byte_time_follows_frame_bits() {
        let params = SerialParams::from_settings("9600");
        assert_eq!(params.bits_per_char(), 11);
        assert_eq!(params.one_byte_time_micros(), 1145);

        let params = SerialParams::from_settings("19200E1");
        assert_eq!(params.bits_per_char(), 11);
        assert_eq!(params.one_byte_time_micros(), 572);
        assert_eq!(params.to_string(), "19200-8E1");

        assert_eq!(SerialParams::from_settings("0").one_byte_time_micros(), 0);
    }
}
