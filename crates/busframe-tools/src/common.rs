use busframe_core::Net;
use busframe_link::{
    EncConfig, EncLayer, LinkError, NativeRtuLayer, NetLayer, RtuConfig, RtuLayer, SerialMode,
    SerialParams, SerialRts, SimSerialLine,
};
use clap::{Args, ValueEnum};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetArg {
    Rtu,
    Enc,
}

impl From<NetArg> for Net {
    fn from(value: NetArg) -> Self {
        match value {
            NetArg::Rtu => Net::Rtu,
            NetArg::Enc => Net::Enc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RtsArg {
    None,
    Up,
    Down,
}

impl From<RtsArg> for SerialRts {
    fn from(value: RtsArg) -> Self {
        match value {
            RtsArg::None => SerialRts::None,
            RtsArg::Up => SerialRts::Up,
            RtsArg::Down => SerialRts::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Rs232,
    Rs485,
}

impl From<ModeArg> for SerialMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Rs232 => SerialMode::Rs232,
            ModeArg::Rs485 => SerialMode::Rs485,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    #[arg(long, value_enum, default_value_t = NetArg::Rtu)]
    pub net: NetArg,
    /// Serial device, or host for enc ("*" for any local address)
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub connection: String,
    /// "<baud><parity><stop>" for rtu, TCP port for enc
    #[arg(long, default_value = "19200E1")]
    pub settings: String,
    #[arg(long, value_enum)]
    pub rts: Option<RtsArg>,
    /// RTS guard time in microseconds
    #[arg(long)]
    pub rts_delay: Option<u32>,
    #[arg(long, value_enum)]
    pub serial_mode: Option<ModeArg>,
    /// Channel timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    pub timeout: u64,
    /// Drive an in-memory serial line instead of a device
    #[arg(long)]
    pub simulate: bool,
}

impl ConnectionArgs {
    pub fn rtu_config(&self) -> RtuConfig {
        let mut config = RtuConfig::default().with_timeout(Duration::from_millis(self.timeout));
        if let Some(mode) = self.serial_mode {
            config = config.with_serial_mode(mode.into());
        }
        if let Some(micros) = self.rts_delay {
            config = config.with_rts_delay(micros);
        }
        if let Some(rts) = self.rts {
            config = config.with_rts(rts.into());
        }
        config
    }

    pub fn enc_config(&self) -> EncConfig {
        let timeout = Duration::from_millis(self.timeout);
        EncConfig::default()
            .with_connect_timeout(timeout)
            .with_write_timeout(timeout)
    }
}

/// Opens the transport described by `args`, connected and ready to send.
pub fn open_layer(args: &ConnectionArgs) -> Result<Box<dyn NetLayer>, LinkError> {
    match args.net {
        NetArg::Rtu if args.simulate => {
            let line = SimSerialLine::for_params(&SerialParams::from_settings(&args.settings));
            let layer = RtuLayer::with_line_config(
                args.connection.as_str(),
                args.settings.as_str(),
                line,
                &args.rtu_config(),
            )?;
            Ok(Box::new(layer))
        }
        NetArg::Rtu => {
            let layer =
                NativeRtuLayer::open_with_config(&args.connection, &args.settings, &args.rtu_config())?;
            Ok(Box::new(layer))
        }
        NetArg::Enc => {
            let mut layer = EncLayer::with_config(&args.connection, &args.settings, args.enc_config())?;
            if layer.is_wildcard() {
                layer.accept()?;
            } else {
                layer.connect()?;
            }
            Ok(Box::new(layer))
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Bytes given on the command line as hex, e.g. `"01 03 00 0A"` or `"0x0103000A"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let digits: String = input
            .split_whitespace()
            .map(|chunk| chunk.trim_start_matches("0x").trim_start_matches("0X"))
            .collect();
        if digits.is_empty() {
            return Err(format!("invalid hex bytes: {input}"));
        }
        hex::decode(&digits)
            .map(HexBytes)
            .map_err(|err| format!("invalid hex bytes: {input}: {err}"))
    }
}

pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
