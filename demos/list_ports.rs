//! Print every serial port on this machine.
//!
//! ```text
//! cargo run --example list_ports
//! ```

fn main() -> serialio::Result<()> {
    let ports = serialio::list_ports()?;
    println!("Found {} ports.", ports.len());
    for port in &ports {
        println!("{:<24} {}", port.name(), port.description());
    }
    Ok(())
}
