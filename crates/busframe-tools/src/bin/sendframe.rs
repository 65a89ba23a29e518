use busframe_core::Message;
use busframe_tools::common::{ConnectionArgs, HexBytes, format_hex, init_tracing, open_layer};
use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "sendframe", about = "Frame a PDU and send it over RTU or ENC")]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,
    #[arg(long, default_value_t = 1)]
    slave: u8,
    /// PDU as hex: function code followed by data
    #[arg(long)]
    pdu: HexBytes,
    #[arg(long, default_value_t = 1)]
    count: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut msg = Message::with_pdu(args.conn.net.into(), args.slave, &args.pdu.0)?;
    let mut layer = open_layer(&args.conn)?;
    if !layer.prepare_to_send(&mut msg) {
        return Err(format!("{} layer refused the frame", msg.net()).into());
    }
    info!(
        connection = layer.connection(),
        settings = layer.settings(),
        frame = %format_hex(msg.adu()),
        "frame prepared"
    );

    for _ in 0..args.count {
        let written = layer.send_raw_message(&msg)?;
        println!("sent {} of {} bytes: {}", written, msg.adu_size(), format_hex(msg.adu()));
    }
    Ok(())
}
