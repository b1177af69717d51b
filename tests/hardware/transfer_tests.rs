//! Transfers on real ports: loop-back plugs and null-modem pairs.

use serialio::{Buffer, EventMask, EventSet, Mode, Port};
use std::time::Duration;

use crate::hardware::utils::{skip_without_hardware, timed};

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_real_port_open_close() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    let mut port = cfg.open(&cfg.port_name);
    let config = port.config().unwrap();
    assert_eq!(config.baudrate, Some(cfg.baud_rate));
    port.close().unwrap();
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_exclusive_open() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    let _first = cfg.open(&cfg.port_name);
    let mut second = Port::by_name(&cfg.port_name).unwrap();
    assert!(second.open(Mode::ReadWrite).is_err());
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_idle_read_timeout() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    let mut port = cfg.open(&cfg.port_name);
    port.flush(Buffer::Both).unwrap();

    let mut buf = [0u8; 32];
    let (n, elapsed) = timed(|| port.blocking_read(&mut buf, 300).unwrap());
    assert_eq!(n, 0);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(800));
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_loopback_echo() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    if !cfg.loopback_enabled {
        println!("Skipping: TEST_LOOPBACK not set");
        return;
    }
    let mut port = cfg.open(&cfg.port_name);
    port.flush(Buffer::Both).unwrap();

    let payload: Vec<u8> = (0..=255u8).collect();
    assert_eq!(port.blocking_write(&payload, cfg.timeout_ms).unwrap(), payload.len());
    port.drain().unwrap();

    let mut back = vec![0u8; payload.len()];
    let n = port.blocking_read(&mut back, cfg.timeout_ms).unwrap();
    assert_eq!(n, payload.len());
    assert_eq!(back, payload);
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_peer_transfer_and_events() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    let Some(peer_name) = cfg.peer_name.clone() else {
        println!("Skipping: TEST_PEER_PORT not set");
        return;
    };
    let mut tx = cfg.open(&cfg.port_name);
    let mut rx = cfg.open(&peer_name);
    rx.flush(Buffer::Input).unwrap();

    let mut events = EventSet::new();
    events.add(&rx, EventMask::RX_READY | EventMask::ERROR).unwrap();

    tx.blocking_write(b"Hello!", cfg.timeout_ms).unwrap();
    let ((), elapsed) = timed(|| events.wait(5000).unwrap());
    assert!(elapsed < Duration::from_secs(5));

    let mut buf = [0u8; 6];
    let n = rx.blocking_read(&mut buf, cfg.timeout_ms).unwrap();
    assert_eq!(&buf[..n], b"Hello!");
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_break_and_signals() {
    let Some(cfg) = skip_without_hardware() else {
        return;
    };
    let mut port = cfg.open(&cfg.port_name);
    port.start_break().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    port.end_break().unwrap();
    println!("signals: {:?}", port.signals().unwrap());
}
