//! Wait up to five seconds for input on any of several ports.
//!
//! ```text
//! cargo run --example await_events -- /dev/ttyUSB0 /dev/ttyUSB1
//! ```

use clap::Parser;
use serialio::{EventMask, EventSet, FlowControl, Mode, Port};

#[derive(Parser, Debug)]
struct Args {
    #[arg(required = true)]
    ports: Vec<String>,
}

fn main() -> serialio::Result<()> {
    let args = Args::parse();
    let mut ports = Vec::new();
    let mut events = EventSet::new();

    for name in &args.ports {
        let mut port = Port::by_name(name)?;
        port.open(Mode::Read)?;
        port.set_baudrate(9600)?;
        port.set_bits(8)?;
        port.set_stopbits(1)?;
        port.set_flowcontrol(FlowControl::None)?;
        events.add(&port, EventMask::RX_READY)?;
        ports.push(port);
    }

    println!("Waiting up to 5 seconds for RX on any port...");
    events.wait(5000)?;

    for port in &ports {
        println!("{}: {} bytes received", port.name(), port.input_waiting()?);
    }
    Ok(())
}
