//! Show the metadata of one port.
//!
//! ```text
//! cargo run --example port_info -- /dev/ttyUSB0
//! ```

use clap::Parser;
use serialio::{Port, Transport};

#[derive(Parser, Debug)]
struct Args {
    /// Port name, e.g. /dev/ttyUSB0 or COM3
    port: String,
}

fn main() -> serialio::Result<()> {
    let args = Args::parse();
    let port = Port::by_name(&args.port)?;

    println!("Port name: {}", port.name());
    println!("Description: {}", port.description());

    match port.transport() {
        Transport::Native => println!("Type: Native"),
        Transport::Usb => {
            println!("Type: USB");
            if let Some(m) = port.usb_manufacturer() {
                println!("Manufacturer: {}", m);
            }
            if let Some(p) = port.usb_product() {
                println!("Product: {}", p);
            }
            if let Some(s) = port.usb_serial() {
                println!("Serial: {}", s);
            }
            if let Ok((vid, pid)) = port.usb_vid_pid() {
                println!("VID: {:04X} PID: {:04X}", vid, pid);
            }
            if let Ok((bus, address)) = port.usb_bus_address() {
                println!("Bus: {} Address: {}", bus, address);
            }
        }
        Transport::Bluetooth => {
            println!("Type: Bluetooth");
            if let Some(addr) = port.bluetooth_address() {
                println!("MAC address: {}", addr);
            }
        }
    }
    Ok(())
}
