use busframe_link::SerialParams;
use busframe_tools::common::init_tracing;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "serialinfo", about = "Show the serial parameters of an RTU settings string")]
struct Args {
    /// Settings string, e.g. "19200E1"
    settings: String,
}

fn main() {
    init_tracing();
    let args = Args::parse();
    let params = SerialParams::from_settings(&args.settings);

    println!("settings={:?}", args.settings);
    println!("baud={}", params.baud);
    println!("parity={}", params.parity);
    println!("data_bits={}", params.data_bits);
    println!("stop_bits={}", params.stop_bits);
    println!("bits_per_char={}", params.bits_per_char());
    println!("one_byte_time_us={}", params.one_byte_time_micros());
}
