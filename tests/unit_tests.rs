//! API-level tests that need no device.
//!
//! Covers configuration building and validation, flow control presets,
//! event masks, timeouts and error reporting.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serialio::timing::Timeout;
use serialio::{
    Cts, Dsr, Dtr, Error, ErrorKind, EventMask, FlowControl, Parity, PortConfiguration, Rts,
    XonXoff,
};

// ============================================================================
// PortConfiguration
// ============================================================================

mod port_config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_config_is_empty() {
        let config = PortConfiguration::new();
        assert!(config.is_empty());
        assert_eq!(config.to_string(), "? ???");
        config.validate().unwrap();
    }

    #[test]
    fn test_builder_display() {
        let config = PortConfiguration::new()
            .with_baudrate(9600)
            .with_bits(8)
            .with_parity(Parity::None)
            .with_stopbits(1);
        assert_eq!(config.to_string(), "9600 8N1");
    }

    #[test]
    fn test_merge_overlays_set_fields_only() {
        let mut base = PortConfiguration::new()
            .with_baudrate(9600)
            .with_bits(8)
            .with_parity(Parity::None);
        let change = PortConfiguration::new().with_baudrate(115200).with_stopbits(2);
        base.merge(&change);

        assert_eq!(base.baudrate, Some(115200));
        assert_eq!(base.bits, Some(8));
        assert_eq!(base.parity, Some(Parity::None));
        assert_eq!(base.stopbits, Some(2));
    }

    #[test]
    fn test_json_uses_snake_case_names() {
        let config = PortConfiguration::new().with_flowcontrol(FlowControl::RtsCts);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["rts"], "flow_control");
        assert_eq!(json["cts"], "flow_control");
        assert_eq!(json["xon_xoff"], "disabled");
        assert!(json["baudrate"].is_null());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PortConfiguration =
            serde_json::from_str(r#"{"baudrate": 4800, "parity": "mark"}"#).unwrap();
        assert_eq!(config.baudrate, Some(4800));
        assert_eq!(config.parity, Some(Parity::Mark));
        assert_eq!(config.bits, None);
    }

    #[test]
    fn test_parse_parity_and_flow() {
        assert_eq!("E".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("rts/cts".parse::<FlowControl>().unwrap(), FlowControl::RtsCts);
        assert_eq!("XON_XOFF".parse::<FlowControl>().unwrap(), FlowControl::XonXoff);
        assert_eq!(
            "sometimes".parse::<Parity>().unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}

// ============================================================================
// Flow control presets
// ============================================================================

mod flowcontrol_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rtscts_preset() {
        let config = PortConfiguration::new().with_flowcontrol(FlowControl::RtsCts);
        assert_eq!(config.rts, Some(Rts::FlowControl));
        assert_eq!(config.cts, Some(Cts::FlowControl));
        assert_eq!(config.dsr, Some(Dsr::Ignore));
        assert_eq!(config.xon_xoff, Some(XonXoff::Disabled));
        assert_eq!(config.dtr, None);
    }

    #[test]
    fn test_disabling_hardware_flow_keeps_lines_asserted() {
        let mut config = PortConfiguration::new()
            .with_flowcontrol(FlowControl::RtsCts);
        config.set_flowcontrol(FlowControl::None);
        assert_eq!(config.rts, Some(Rts::On));
        assert_eq!(config.cts, Some(Cts::Ignore));

        let mut config = PortConfiguration::new().with_flowcontrol(FlowControl::DtrDsr);
        assert_eq!(config.dtr, Some(Dtr::FlowControl));
        config.set_flowcontrol(FlowControl::XonXoff);
        assert_eq!(config.dtr, Some(Dtr::On));
        assert_eq!(config.xon_xoff, Some(XonXoff::InOut));
    }

    #[test]
    fn test_preset_leaves_explicit_off_alone() {
        let mut config = PortConfiguration {
            rts: Some(Rts::Off),
            ..PortConfiguration::default()
        };
        config.set_flowcontrol(FlowControl::None);
        assert_eq!(config.rts, Some(Rts::Off));
    }
}

// ============================================================================
// Errors
// ============================================================================

mod error_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::InvalidArgument.code(), -1);
        assert_eq!(ErrorKind::OsFailure.code(), -2);
        assert_eq!(ErrorKind::AllocationFailure.code(), -3);
        assert_eq!(ErrorKind::Unsupported.code(), -4);
    }

    #[test]
    fn test_os_error_keeps_code() {
        let err = Error::os("open", io::Error::from_raw_os_error(2));
        assert_eq!(err.kind(), ErrorKind::OsFailure);
        assert_eq!(err.os_code(), Some(2));
        assert!(err.to_string().starts_with("open failed"));
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = Error::unsupported("break").into();
        assert_eq!(io_err.kind(), io::ErrorKind::Unsupported);
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_validate_accepts_exactly_legal_values(
        baud in 0u32..4_000_000,
        bits in 0u8..12,
        stopbits in 0u8..4,
    ) {
        let config = PortConfiguration::new()
            .with_baudrate(baud)
            .with_bits(bits)
            .with_stopbits(stopbits);
        let legal = baud > 0 && (5..=8).contains(&bits) && (stopbits == 1 || stopbits == 2);
        match config.validate() {
            Ok(()) => prop_assert!(legal),
            Err(err) => {
                prop_assert!(!legal);
                prop_assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            }
        }
    }

    #[test]
    fn prop_event_mask_bits(bits in any::<u8>()) {
        match EventMask::from_bits(bits) {
            Ok(mask) => {
                prop_assert!(bits < 8);
                prop_assert_eq!(mask.bits(), bits);
            }
            Err(err) => {
                prop_assert!(bits >= 8);
                prop_assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            }
        }
    }

    #[test]
    fn prop_timeout_step_never_exceeds_ceiling(ms in 1u32..u32::MAX, ceiling in 1u32..100_000) {
        let t = Timeout::start(ms).with_ceiling(ceiling);
        prop_assert!(t.remaining_ms() <= ceiling);
        prop_assert_eq!(t.overflowed(), ms > ceiling);
    }

    #[test]
    fn prop_merge_with_self_is_identity(baud in 1u32..1_000_000, bits in 5u8..=8) {
        let config = PortConfiguration::new().with_baudrate(baud).with_bits(bits);
        let mut merged = config.clone();
        merged.merge(&config);
        prop_assert_eq!(merged, config);
    }
}

#[test]
fn test_infinite_timeout_never_expires() {
    let mut t = Timeout::start(0).with_ceiling(10);
    t.record_attempt();
    assert!(t.is_infinite());
    assert!(!t.expired());
    assert_eq!(t.remaining_ms(), 0);
}
