//! Read a port's settings, change them, and read them back.
//!
//! ```text
//! cargo run --example port_config -- /dev/ttyUSB0
//! ```

use clap::Parser;
use serialio::{FlowControl, Mode, Parity, Port, PortConfiguration};

#[derive(Parser, Debug)]
struct Args {
    port: String,
}

fn show(label: &str, config: &PortConfiguration) {
    println!("{}: {}", label, config);
    println!("  rts={:?} cts={:?} dtr={:?} dsr={:?} xon/xoff={:?}",
        config.rts, config.cts, config.dtr, config.dsr, config.xon_xoff);
}

fn main() -> serialio::Result<()> {
    let args = Args::parse();
    let mut port = Port::by_name(&args.port)?;
    port.open(Mode::ReadWrite)?;

    let initial = port.config()?;
    show("Current", &initial);

    println!("Setting 115200 8N1 with RTS/CTS flow control");
    port.set_config(
        &PortConfiguration::new()
            .with_baudrate(115_200)
            .with_bits(8)
            .with_parity(Parity::None)
            .with_stopbits(1)
            .with_flowcontrol(FlowControl::RtsCts),
    )?;
    show("Now", &port.config()?);

    // Individual setters apply on top of the live settings
    port.set_baudrate(9600)?;
    port.set_flowcontrol(FlowControl::None)?;
    show("After setters", &port.config()?);

    port.set_config(&initial)?;
    show("Restored", &port.config()?);

    port.close()
}
