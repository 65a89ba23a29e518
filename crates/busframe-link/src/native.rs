use crate::line::{SerialLine, SerialMode, SerialRts};
use crate::rtu::{RtuConfig, RtuLayer, SerialParams};
use crate::LinkError;
use busframe_core::Net;
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, StopBits};

#[cfg(target_os = "linux")]
use serial2::rs4xx::{Rs485Config, TransceiverMode};

/// RTU transport on an operating-system serial port.
pub type NativeRtuLayer = RtuLayer<NativeSerialLine>;

/// Blocking serial port opened through `tokio-serial`'s synchronous API.
///
/// The electrical mode is switched with the kernel RS-485 ioctl through
/// `serial2` on Linux. It starts as RS-232 and reads back what was last set.
pub struct NativeSerialLine {
    port: Box<dyn SerialPort>,
    path: Option<String>,
    mode: SerialMode,
    rts: SerialRts,
    rts_delay: u32,
}

impl NativeSerialLine {
    pub fn open(path: &str, params: &SerialParams, timeout: Duration) -> Result<Self, LinkError> {
        let port = tokio_serial::new(path, params.baud)
            .data_bits(data_bits(params.data_bits))
            .parity(parity(params.parity))
            .stop_bits(stop_bits(params.stop_bits))
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|err| LinkError::Io(err.into()))?;
        Ok(Self::from_port(port, params))
    }

    /// Wraps an open port. The default RTS delay is one character time.
    pub fn from_port(port: Box<dyn SerialPort>, params: &SerialParams) -> Self {
        Self {
            path: port.name(),
            port,
            mode: SerialMode::Rs232,
            rts: SerialRts::None,
            rts_delay: params.one_byte_time_micros(),
        }
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl fmt::Debug for NativeSerialLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSerialLine")
            .field("port", &self.path)
            .field("mode", &self.mode)
            .field("rts", &self.rts)
            .field("rts_delay", &self.rts_delay)
            .finish()
    }
}

impl SerialLine for NativeSerialLine {
    fn write_raw(&mut self, data: &[u8]) -> Result<usize, LinkError> {
        Ok(self.port.write(data)?)
    }

    fn serial_mode(&self) -> Result<SerialMode, LinkError> {
        Ok(self.mode)
    }

    #[cfg(target_os = "linux")]
    fn set_serial_mode(&mut self, mode: SerialMode) -> Result<(), LinkError> {
        let target = rs4xx_mode(mode)
            .ok_or(LinkError::InvalidMode("serial mode must be rs232 or rs485"))?;
        let path = self
            .path
            .as_deref()
            .ok_or(LinkError::Unsupported("serial mode on an unnamed port"))?;
        // Second handle on the same tty; the ioctl applies to the device.
        let control = serial2::SerialPort::open(path, serial2::KeepSettings)?;
        control.set_rs4xx_mode(target)?;
        self.mode = mode;
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn set_serial_mode(&mut self, mode: SerialMode) -> Result<(), LinkError> {
        match mode {
            SerialMode::Rs232 => {
                self.mode = mode;
                Ok(())
            }
            _ => Err(LinkError::Unsupported("kernel rs485 mode")),
        }
    }

    fn rts(&self) -> Result<SerialRts, LinkError> {
        Ok(self.rts)
    }

    #[cfg(unix)]
    fn set_rts(&mut self, mode: SerialRts) -> Result<(), LinkError> {
        self.port
            .write_request_to_send(mode.idle_level())
            .map_err(|err| LinkError::Io(err.into()))?;
        self.rts = mode;
        Ok(())
    }

    #[cfg(not(unix))]
    fn set_rts(&mut self, _mode: SerialRts) -> Result<(), LinkError> {
        Err(LinkError::Unsupported("rts toggle"))
    }

    fn rts_delay(&self) -> Result<u32, LinkError> {
        Ok(self.rts_delay)
    }

    fn set_rts_delay(&mut self, micros: u32) -> Result<(), LinkError> {
        self.rts_delay = micros;
        Ok(())
    }
}

impl RtuLayer<NativeSerialLine> {
    /// Opens `port` with the baud rate, parity and stop bits in `settings`.
    pub fn open(port: &str, settings: &str) -> Result<Self, LinkError> {
        Self::open_with_config(port, settings, &RtuConfig::default())
    }

    pub fn open_with_config(
        port: &str,
        settings: &str,
        config: &RtuConfig,
    ) -> Result<Self, LinkError> {
        let params = SerialParams::from_settings(settings);
        let line = NativeSerialLine::open(port, &params, config.timeout)
            .map_err(|err| LinkError::open(Net::Rtu, port, settings, err))?;
        Self::with_line_config(port, settings, line, config)
    }
}

#[cfg(target_os = "linux")]
fn rs4xx_mode(mode: SerialMode) -> Option<TransceiverMode> {
    match mode {
        SerialMode::Rs232 => Some(TransceiverMode::Default),
        SerialMode::Rs485 => Some(TransceiverMode::Rs485(Rs485Config::new())),
        SerialMode::Unknown => None,
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn parity(parity: char) -> Parity {
    match parity {
        'E' => Parity::Even,
        'O' => Parity::Odd,
        _ => Parity::None,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    if bits == 1 {
        StopBits::One
    } else {
        StopBits::Two
    }
}
