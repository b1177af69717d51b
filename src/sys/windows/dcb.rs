//! DCB translation.

use crate::error::Result;
use crate::port::{Cts, Dsr, Dtr, LineConfig, Parity, PortConfiguration, Rts, XonXoff};
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::um::winbase::{
    DCB, DTR_CONTROL_DISABLE, DTR_CONTROL_ENABLE, DTR_CONTROL_HANDSHAKE, EVENPARITY, MARKPARITY,
    NOPARITY, ODDPARITY, ONESTOPBIT, RTS_CONTROL_DISABLE, RTS_CONTROL_ENABLE,
    RTS_CONTROL_HANDSHAKE, SPACEPARITY, TWOSTOPBITS,
};

/// Native line state for a COMM handle.
#[derive(Clone, Copy)]
pub(crate) struct WindowsLineConfig {
    pub(crate) dcb: DCB,
}

impl WindowsLineConfig {
    /// Binary mode, no error replacement, no null stripping, no abort on error.
    pub(crate) fn make_raw(&mut self) {
        self.dcb.set_fBinary(TRUE as DWORD);
        self.dcb.set_fDsrSensitivity(FALSE as DWORD);
        self.dcb.set_fErrorChar(FALSE as DWORD);
        self.dcb.set_fNull(FALSE as DWORD);
        self.dcb.set_fAbortOnError(FALSE as DWORD);
    }
}

impl LineConfig for WindowsLineConfig {
    fn decode(&self) -> PortConfiguration {
        let dcb = &self.dcb;
        let mut config = PortConfiguration::new();

        // CBR_* constants are the plain rates, custom rates are stored as-is
        config.baudrate = Some(dcb.BaudRate).filter(|&b| b != 0);
        config.bits = Some(dcb.ByteSize).filter(|b| (5..=8).contains(b));

        config.parity = if dcb.fParity() != 0 {
            match dcb.Parity {
                NOPARITY => Some(Parity::None),
                ODDPARITY => Some(Parity::Odd),
                EVENPARITY => Some(Parity::Even),
                MARKPARITY => Some(Parity::Mark),
                SPACEPARITY => Some(Parity::Space),
                _ => None,
            }
        } else {
            Some(Parity::None)
        };

        // 1.5 stop bits has no portable representation
        config.stopbits = match dcb.StopBits {
            ONESTOPBIT => Some(1),
            TWOSTOPBITS => Some(2),
            _ => None,
        };

        config.rts = match dcb.fRtsControl() {
            RTS_CONTROL_DISABLE => Some(Rts::Off),
            RTS_CONTROL_ENABLE => Some(Rts::On),
            RTS_CONTROL_HANDSHAKE => Some(Rts::FlowControl),
            _ => None,
        };
        config.cts = Some(if dcb.fOutxCtsFlow() != 0 {
            Cts::FlowControl
        } else {
            Cts::Ignore
        });

        config.dtr = match dcb.fDtrControl() {
            DTR_CONTROL_DISABLE => Some(Dtr::Off),
            DTR_CONTROL_ENABLE => Some(Dtr::On),
            DTR_CONTROL_HANDSHAKE => Some(Dtr::FlowControl),
            _ => None,
        };
        config.dsr = Some(if dcb.fOutxDsrFlow() != 0 {
            Dsr::FlowControl
        } else {
            Dsr::Ignore
        });

        config.xon_xoff = Some(match (dcb.fInX() != 0, dcb.fOutX() != 0) {
            (true, true) => XonXoff::InOut,
            (true, false) => XonXoff::In,
            (false, true) => XonXoff::Out,
            (false, false) => XonXoff::Disabled,
        });

        config
    }

    fn encode(&mut self, config: &PortConfiguration) -> Result<()> {
        config.validate()?;
        let mut dcb = self.dcb;

        if let Some(baud) = config.baudrate {
            dcb.BaudRate = baud;
        }
        if let Some(bits) = config.bits {
            dcb.ByteSize = bits;
        }
        if let Some(parity) = config.parity {
            dcb.Parity = match parity {
                Parity::None => NOPARITY,
                Parity::Odd => ODDPARITY,
                Parity::Even => EVENPARITY,
                Parity::Mark => MARKPARITY,
                Parity::Space => SPACEPARITY,
            };
            dcb.set_fParity((parity != Parity::None) as DWORD);
        }
        if let Some(stopbits) = config.stopbits {
            dcb.StopBits = if stopbits == 2 { TWOSTOPBITS } else { ONESTOPBIT };
        }
        if let Some(rts) = config.rts {
            dcb.set_fRtsControl(match rts {
                Rts::Off => RTS_CONTROL_DISABLE,
                Rts::On => RTS_CONTROL_ENABLE,
                Rts::FlowControl => RTS_CONTROL_HANDSHAKE,
            });
        }
        if let Some(cts) = config.cts {
            dcb.set_fOutxCtsFlow((cts == Cts::FlowControl) as DWORD);
        }
        if let Some(dtr) = config.dtr {
            dcb.set_fDtrControl(match dtr {
                Dtr::Off => DTR_CONTROL_DISABLE,
                Dtr::On => DTR_CONTROL_ENABLE,
                Dtr::FlowControl => DTR_CONTROL_HANDSHAKE,
            });
        }
        if let Some(dsr) = config.dsr {
            dcb.set_fOutxDsrFlow((dsr == Dsr::FlowControl) as DWORD);
        }
        if let Some(xon_xoff) = config.xon_xoff {
            let (inx, outx) = match xon_xoff {
                XonXoff::Disabled => (false, false),
                XonXoff::In => (true, false),
                XonXoff::Out => (false, true),
                XonXoff::InOut => (true, true),
            };
            dcb.set_fInX(inx as DWORD);
            dcb.set_fOutX(outx as DWORD);
        }

        self.dcb = dcb;
        Ok(())
    }
}
