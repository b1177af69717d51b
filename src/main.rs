use clap::{Parser, Subcommand};
use serde_json::json;
use serialio::config::{Config, ConfigLoader};
use serialio::{
    list_ports, EventMask, EventSet, FlowControl, Mode, Parity, Port, PortConfiguration, Signals,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect, configure and talk to serial ports.",
    long_about = "Lists serial devices with their USB/Bluetooth metadata, reads and changes line settings, and moves bytes with timeouts. Port names may be aliases from the [serial.port_aliases] config table."
)]
struct Args {
    /// Configuration file (overrides SERIALIO_CONFIG and the default search)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print low-level port tracing to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports present on this machine
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show metadata for one port
    Info {
        port: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the live line settings, changing any that are given
    Config {
        port: String,
        #[arg(long)]
        baud: Option<u32>,
        #[arg(long)]
        bits: Option<u8>,
        /// none, odd, even, mark or space
        #[arg(long)]
        parity: Option<Parity>,
        #[arg(long)]
        stop_bits: Option<u8>,
        /// none, xonxoff, rtscts or dtrdsr
        #[arg(long)]
        flow: Option<FlowControl>,
    },
    /// Write data to a port
    Send {
        port: String,
        data: String,
        /// Append a newline
        #[arg(short = 'n', long)]
        newline: bool,
        #[arg(long)]
        timeout_ms: Option<u32>,
    },
    /// Read from a port and print to stdout
    Receive {
        port: String,
        /// Bytes to read
        #[arg(short, long, default_value_t = 64)]
        count: usize,
        #[arg(long)]
        timeout_ms: Option<u32>,
        /// Stop after the first newline
        #[arg(long)]
        line: bool,
    },
    /// Block until one of the ports has input
    Wait {
        #[arg(required = true)]
        ports: Vec<String>,
        #[arg(long)]
        timeout_ms: Option<u32>,
    },
    /// Show modem status lines
    Signals { port: String },
    /// Print the library version
    Version,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(2);
        }
    };

    serialio::logging::init_logging(&settings.logging, args.verbose);
    if args.debug {
        serialio::set_debug_handler(Some(serialio::stderr_debug_handler));
    }

    match run(args.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("command failed: {:?}", err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(args: &Args) -> CliResult<Config> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader.into_config())
}

fn run(command: Command, settings: &Config) -> CliResult<()> {
    let timeout = |t: Option<u32>| t.unwrap_or(settings.serial.default_timeout_ms);
    let lookup = |name: &str| Port::by_name(&settings.serial.resolve_port(name));

    match command {
        Command::List { json } => cmd_list(json),
        Command::Info { port, json } => cmd_info(&lookup(&port)?, json),
        Command::Config {
            port,
            baud,
            bits,
            parity,
            stop_bits,
            flow,
        } => {
            let mut change = PortConfiguration {
                baudrate: baud,
                bits,
                parity,
                stopbits: stop_bits,
                ..PortConfiguration::default()
            };
            if let Some(flow) = flow {
                change.set_flowcontrol(flow);
            }
            cmd_config(lookup(&port)?, &change)
        }
        Command::Send {
            port,
            mut data,
            newline,
            timeout_ms,
        } => {
            if newline {
                data.push('\n');
            }
            let mut port = open_with_defaults(lookup(&port)?, Mode::Write, settings)?;
            let sent = port.blocking_write(data.as_bytes(), timeout(timeout_ms))?;
            port.drain()?;
            println!("sent {} of {} bytes", sent, data.len());
            Ok(())
        }
        Command::Receive {
            port,
            count,
            timeout_ms,
            line,
        } => {
            let mut port = open_with_defaults(lookup(&port)?, Mode::Read, settings)?;
            let data = if line {
                receive_line(&mut port, count, timeout(timeout_ms))?
            } else {
                let mut buf = vec![0u8; count];
                let n = port.blocking_read(&mut buf, timeout(timeout_ms))?;
                buf.truncate(n);
                buf
            };
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            Ok(())
        }
        Command::Wait { ports, timeout_ms } => {
            let mut opened = Vec::with_capacity(ports.len());
            for name in &ports {
                opened.push(open_with_defaults(lookup(name)?, Mode::Read, settings)?);
            }
            cmd_wait(&opened, timeout(timeout_ms))
        }
        Command::Signals { port } => {
            let mut port = lookup(&port)?;
            port.open(Mode::Read)?;
            let signals = port.signals()?;
            for (flag, name) in [
                (Signals::CTS, "CTS"),
                (Signals::DSR, "DSR"),
                (Signals::DCD, "DCD"),
                (Signals::RI, "RI"),
            ] {
                println!("{:<4}{}", name, if signals.contains(flag) { "on" } else { "off" });
            }
            Ok(())
        }
        Command::Version => {
            println!("serialio {}", serialio::version_string());
            Ok(())
        }
    }
}

fn open_with_defaults(mut port: Port, mode: Mode, settings: &Config) -> CliResult<Port> {
    port.open(mode)?;
    port.set_config(&settings.serial.port_configuration())?;
    Ok(port)
}

fn cmd_list(as_json: bool) -> CliResult<()> {
    let ports = list_ports()?;
    if as_json {
        let list: Vec<_> = ports
            .iter()
            .map(|p| json!({ "name": p.name(), "info": p.info() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in &ports {
        let ids = port
            .usb_vid_pid()
            .map(|(vid, pid)| format!("{:04x}:{:04x}", vid, pid))
            .unwrap_or_default();
        println!(
            "{:<24} {:<10} {:<10} {}",
            port.name(),
            port.transport(),
            ids,
            port.description()
        );
    }
    Ok(())
}

fn cmd_info(port: &Port, as_json: bool) -> CliResult<()> {
    if as_json {
        let value = json!({ "name": port.name(), "info": port.info() });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("name:         {}", port.name());
    println!("description:  {}", port.description());
    println!("transport:    {}", port.transport());
    if let Ok((bus, address)) = port.usb_bus_address() {
        println!("usb bus/addr: {:03}/{:03}", bus, address);
    }
    if let Ok((vid, pid)) = port.usb_vid_pid() {
        println!("usb vid:pid:  {:04x}:{:04x}", vid, pid);
    }
    if let Ok(interface) = port.usb_interface_number() {
        println!("interface:    {}", interface);
    }
    for (label, value) in [
        ("manufacturer", port.usb_manufacturer()),
        ("product", port.usb_product()),
        ("serial", port.usb_serial()),
        ("bt address", port.bluetooth_address()),
    ] {
        if let Some(value) = value {
            println!("{:<14}{}", format!("{}:", label), value);
        }
    }
    Ok(())
}

fn cmd_config(mut port: Port, change: &PortConfiguration) -> CliResult<()> {
    port.open(Mode::ReadWrite)?;
    if !change.is_empty() {
        port.set_config(change)?;
    }
    let config = port.config()?;
    println!("{}", config);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Read until a newline, `limit` bytes, or a read that times out.
fn receive_line(port: &mut Port, limit: usize, timeout_ms: u32) -> CliResult<Vec<u8>> {
    let mut line = Vec::new();
    let mut chunk = [0u8; 256];
    while line.len() < limit {
        let want = chunk.len().min(limit - line.len());
        let n = port.blocking_read_next(&mut chunk[..want], timeout_ms)?;
        if n == 0 {
            break;
        }
        if let Some(pos) = memchr::memchr(b'\n', &chunk[..n]) {
            line.extend_from_slice(&chunk[..=pos]);
            break;
        }
        line.extend_from_slice(&chunk[..n]);
    }
    Ok(line)
}

fn cmd_wait(ports: &[Port], timeout_ms: u32) -> CliResult<()> {
    let mut events = EventSet::new();
    for port in ports {
        events.add(port, EventMask::RX_READY | EventMask::ERROR)?;
    }
    events.wait(timeout_ms)?;
    for port in ports {
        println!("{:<24} {} bytes waiting", port.name(), port.input_waiting()?);
    }
    Ok(())
}
