//! Enumeration against the real machine.

use serialio::{list_ports, Port, Transport};

use crate::hardware::utils::skip_without_hardware;

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_port_discovery() {
    let ports = list_ports().expect("enumeration should work on this platform");
    println!("Found {} port(s)", ports.len());
    for port in &ports {
        println!("  - {} [{}] {}", port.name(), port.transport(), port.description());
        assert!(!port.is_open());
        assert!(!port.description().is_empty());
    }
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_usb_ports_report_ids() {
    let ports = list_ports().unwrap();
    for port in ports.iter().filter(|p| p.transport() == Transport::Usb) {
        match port.usb_vid_pid() {
            Ok((vid, pid)) => println!("{} {:04x}:{:04x}", port.name(), vid, pid),
            Err(e) => println!("{} has no VID/PID: {}", port.name(), e),
        }
    }
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_test_port_is_listed() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    let wanted = Port::by_name(&cfg.port_name).unwrap();
    let ports = list_ports().unwrap();
    assert!(
        ports.iter().any(|p| p.name() == wanted.name()),
        "{} missing from enumeration",
        wanted.name()
    );
}
