use busframe_core::crc16;
use busframe_core::frame::rtu;
use busframe_tools::common::{HexBytes, format_hex, init_tracing};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "crc16", about = "Compute or verify the RTU CRC16 of hex bytes")]
struct Args {
    /// Hex bytes, e.g. "01 03 00 00 00 0A"
    data: HexBytes,
    /// Treat the input as a complete frame and check its trailing CRC
    #[arg(long)]
    verify: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let bytes = args.data.0;

    if args.verify {
        let (slave, pdu) = rtu::decode_frame(&bytes)?;
        println!("valid frame slave={} pdu={}", slave, format_hex(pdu));
        return Ok(());
    }

    let crc = crc16(&bytes);
    let mut framed = bytes;
    framed.extend_from_slice(&rtu::crc_bytes(crc));
    println!("crc=0x{:04X} frame={}", crc, format_hex(&framed));
    Ok(())
}
