//! Portable line configuration.
//!
//! [`PortConfiguration`] is sparse: every field is either `None` ("leave
//! this setting alone") or a concrete value. Platform backends translate it
//! to and from their native structure through [`LineConfig`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// RTS pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rts {
    Off,
    On,
    FlowControl,
}

/// CTS pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cts {
    Ignore,
    FlowControl,
}

/// DTR pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtr {
    Off,
    On,
    FlowControl,
}

/// DSR pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dsr {
    Ignore,
    FlowControl,
}

/// XON/XOFF software flow control direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XonXoff {
    Disabled,
    /// Incoming data is paused with XOFF.
    In,
    /// Outgoing data is paused on receipt of XOFF.
    Out,
    InOut,
}

/// Common flow control presets, expanded into the individual pin settings
/// by [`PortConfiguration::set_flowcontrol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    XonXoff,
    RtsCts,
    DtrDsr,
}

/// Sparse set of line settings.
///
/// Created empty (every field unset) or read from an open port with
/// [`Port::config`](crate::Port::config). Nothing is sent to the device until
/// the configuration is applied with [`Port::set_config`](crate::Port::set_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfiguration {
    pub baudrate: Option<u32>,
    /// Data bits per character, 5 to 8.
    pub bits: Option<u8>,
    pub parity: Option<Parity>,
    /// Stop bits, 1 or 2.
    pub stopbits: Option<u8>,
    pub rts: Option<Rts>,
    pub cts: Option<Cts>,
    pub dtr: Option<Dtr>,
    pub dsr: Option<Dsr>,
    pub xon_xoff: Option<XonXoff>,
}

impl PortConfiguration {
    /// An empty configuration; applying it changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = Some(baudrate);
        self
    }

    pub fn with_bits(mut self, bits: u8) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = Some(parity);
        self
    }

    pub fn with_stopbits(mut self, stopbits: u8) -> Self {
        self.stopbits = Some(stopbits);
        self
    }

    pub fn with_flowcontrol(mut self, flowcontrol: FlowControl) -> Self {
        self.set_flowcontrol(flowcontrol);
        self
    }

    /// Expand a flow control preset into the pin and XON/XOFF fields.
    ///
    /// Turning a hardware preset off leaves a previously flow-controlled
    /// output line asserted rather than dropping it.
    pub fn set_flowcontrol(&mut self, flowcontrol: FlowControl) {
        self.xon_xoff = Some(if flowcontrol == FlowControl::XonXoff {
            XonXoff::InOut
        } else {
            XonXoff::Disabled
        });

        if flowcontrol == FlowControl::RtsCts {
            self.rts = Some(Rts::FlowControl);
            self.cts = Some(Cts::FlowControl);
        } else {
            if self.rts == Some(Rts::FlowControl) {
                self.rts = Some(Rts::On);
            }
            self.cts = Some(Cts::Ignore);
        }

        if flowcontrol == FlowControl::DtrDsr {
            self.dtr = Some(Dtr::FlowControl);
            self.dsr = Some(Dsr::FlowControl);
        } else {
            if self.dtr == Some(Dtr::FlowControl) {
                self.dtr = Some(Dtr::On);
            }
            self.dsr = Some(Dsr::Ignore);
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay every set field of `other` onto `self`.
    pub fn merge(&mut self, other: &PortConfiguration) {
        macro_rules! take {
            ($($field:ident),*) => {
                $( if other.$field.is_some() { self.$field = other.$field; } )*
            };
        }
        take!(baudrate, bits, parity, stopbits, rts, cts, dtr, dsr, xon_xoff);
    }

    /// Platform-independent range checks.
    pub fn validate(&self) -> Result<()> {
        if self.baudrate == Some(0) {
            return Err(Error::invalid("baud rate must be positive"));
        }
        if let Some(bits) = self.bits {
            if !(5..=8).contains(&bits) {
                return Err(Error::invalid(format!("data bits must be 5-8, got {}", bits)));
            }
        }
        if let Some(stopbits) = self.stopbits {
            if stopbits != 1 && stopbits != 2 {
                return Err(Error::invalid(format!(
                    "stop bits must be 1 or 2, got {}",
                    stopbits
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PortConfiguration {
    /// `9600 8N1` style summary; unset fields print as `?`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "?".to_string());
        let parity = self.parity.map(|p| match p {
            Parity::None => "N",
            Parity::Odd => "O",
            Parity::Even => "E",
            Parity::Mark => "M",
            Parity::Space => "S",
        });
        write!(
            f,
            "{} {}{}{}",
            opt(self.baudrate.map(|b| b.to_string())),
            opt(self.bits.map(|b| b.to_string())),
            parity.unwrap_or("?"),
            opt(self.stopbits.map(|s| s.to_string())),
        )
    }
}

impl FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            "mark" | "m" => Ok(Parity::Mark),
            "space" | "s" => Ok(Parity::Space),
            other => Err(Error::invalid(format!("unknown parity '{}'", other))),
        }
    }
}

impl FromStr for FlowControl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_', '/'], "").as_str() {
            "none" => Ok(FlowControl::None),
            "xonxoff" | "software" => Ok(FlowControl::XonXoff),
            "rtscts" | "hardware" => Ok(FlowControl::RtsCts),
            "dtrdsr" => Ok(FlowControl::DtrDsr),
            _ => Err(Error::invalid(format!("unknown flow control '{}'", s))),
        }
    }
}

/// Translation between a platform's native line structure and
/// [`PortConfiguration`].
///
/// `encode` only touches fields that are set and must fail without side
/// effects on the live device; backends commit the encoded structure in a
/// separate step.
pub trait LineConfig {
    /// Decode every field; anything ambiguous is left unset.
    fn decode(&self) -> PortConfiguration;

    /// Write every set field of `config` into `self`.
    fn encode(&mut self, config: &PortConfiguration) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_configuration_is_empty() {
        let config = PortConfiguration::default();
        assert!(config.is_empty());
        assert_eq!(config.baudrate, None);
        assert_eq!(config.to_string(), "? ???");
    }

    #[test]
    fn test_builder_and_display() {
        let config = PortConfiguration::new()
            .with_baudrate(115_200)
            .with_bits(8)
            .with_parity(Parity::None)
            .with_stopbits(1);
        assert_eq!(config.to_string(), "115200 8N1");
        assert_eq!(config.rts, None);
    }

    #[test]
    fn test_flowcontrol_rtscts() {
        let config = PortConfiguration::new().with_flowcontrol(FlowControl::RtsCts);
        assert_eq!(config.rts, Some(Rts::FlowControl));
        assert_eq!(config.cts, Some(Cts::FlowControl));
        assert_eq!(config.dtr, None);
        assert_eq!(config.dsr, Some(Dsr::Ignore));
        assert_eq!(config.xon_xoff, Some(XonXoff::Disabled));
    }

    #[test]
    fn test_flowcontrol_none_keeps_lines_asserted() {
        let mut config = PortConfiguration::new().with_flowcontrol(FlowControl::RtsCts);
        config.dtr = Some(Dtr::FlowControl);
        config.set_flowcontrol(FlowControl::None);
        assert_eq!(config.rts, Some(Rts::On));
        assert_eq!(config.cts, Some(Cts::Ignore));
        assert_eq!(config.dtr, Some(Dtr::On));
        assert_eq!(config.dsr, Some(Dsr::Ignore));
    }

    #[test]
    fn test_flowcontrol_none_preserves_explicit_off() {
        let mut config = PortConfiguration::new();
        config.rts = Some(Rts::Off);
        config.set_flowcontrol(FlowControl::XonXoff);
        assert_eq!(config.rts, Some(Rts::Off));
        assert_eq!(config.xon_xoff, Some(XonXoff::InOut));
    }

    #[test]
    fn test_validate() {
        assert!(PortConfiguration::new().with_bits(5).validate().is_ok());
        let err = PortConfiguration::new().with_bits(9).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = PortConfiguration::new().with_stopbits(3).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = PortConfiguration::new().with_baudrate(0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_merge_only_set_fields() {
        let mut base = PortConfiguration::new().with_baudrate(9600).with_bits(7);
        base.merge(&PortConfiguration::new().with_baudrate(19_200));
        assert_eq!(base.baudrate, Some(19_200));
        assert_eq!(base.bits, Some(7));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("E".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("space".parse::<Parity>().unwrap(), Parity::Space);
        assert!("x".parse::<Parity>().is_err());
        assert_eq!("rts/cts".parse::<FlowControl>().unwrap(), FlowControl::RtsCts);
        assert_eq!("XON_XOFF".parse::<FlowControl>().unwrap(), FlowControl::XonXoff);
    }

    #[test]
    fn test_serde_roundtrip_keeps_unset() {
        let config = PortConfiguration::new().with_parity(Parity::Mark);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"parity\":\"mark\""));
        let back: PortConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
