//! Send a greeting on one port and read it back on another (or the same
//! port with TX wired to RX).
//!
//! ```text
//! cargo run --example send_receive -- /dev/ttyUSB0 /dev/ttyUSB1
//! ```

use clap::Parser;
use serialio::{FlowControl, Mode, Parity, Port, PortConfiguration};

#[derive(Parser, Debug)]
struct Args {
    /// Transmitting port
    tx: String,
    /// Receiving port; defaults to `tx` for a loop-back plug
    rx: Option<String>,
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u32,
}

fn open(name: &str) -> serialio::Result<Port> {
    let mut port = Port::by_name(name)?;
    port.open(Mode::ReadWrite)?;
    port.set_config(
        &PortConfiguration::new()
            .with_baudrate(9600)
            .with_bits(8)
            .with_parity(Parity::None)
            .with_stopbits(1)
            .with_flowcontrol(FlowControl::None),
    )?;
    Ok(port)
}

fn main() -> serialio::Result<()> {
    let args = Args::parse();
    let data = b"Hello!";

    let mut tx = open(&args.tx)?;
    let mut rx = match &args.rx {
        Some(name) => Some(open(name)?),
        None => None,
    };

    let sent = tx.blocking_write(data, args.timeout_ms)?;
    if sent == data.len() {
        println!("Sent {} bytes on {}", sent, tx.name());
    } else {
        println!("Timed out, {}/{} bytes sent", sent, data.len());
    }

    let reader = rx.as_mut().unwrap_or(&mut tx);
    let mut buf = vec![0u8; data.len()];
    let got = reader.blocking_read(&mut buf, args.timeout_ms)?;
    if got == data.len() {
        println!("Received {} bytes on {}", got, reader.name());
    } else {
        println!("Timed out, {}/{} bytes received", got, data.len());
    }
    println!("Received '{}'", String::from_utf8_lossy(&buf[..got]));
    Ok(())
}
