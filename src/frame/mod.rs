// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::{fmt, str::FromStr};

mod command;
mod measurement;
mod reading;

pub use self::{command::*, measurement::*, reading::*};
use crate::error::ConstructionError;

/// Network address of a meter on the bus.
pub type Address = u8;

/// Every meter on the bus listens to this address.
pub const BROADCAST: Address = 0x00;

/// Address, status and CRC.
pub const MIN_FRAME_LEN: usize = 4;

/// Large enough for every request and response of the supported commands.
pub const MAX_FRAME_LEN: usize = 32;

/// Longest parameter list of any command (access level + password).
pub const MAX_PARAMS_LEN: usize = 7;

/// A request addressed to one meter (or to [`BROADCAST`]).
///
/// The parameter length is checked against the command schema when the
/// request is built, so an existing `Request` always encodes to a valid frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    address: Address,
    command: CommandCode,
    params: [u8; MAX_PARAMS_LEN],
    params_len: usize,
}

impl Request {
    /// Build a request from raw parameter bytes.
    ///
    /// The command's fixed parameter prefix (e.g. the `0x11` of
    /// [`CommandCode::ReadAuxiliary`]) is not part of `parameters`.
    pub fn new(
        address: Address,
        command: CommandCode,
        parameters: &[u8],
    ) -> Result<Self, ConstructionError> {
        let schema = command.schema();
        if parameters.len() != schema.params_len {
            return Err(ConstructionError::ParameterLength(
                schema.params_len,
                parameters.len(),
            ));
        }
        if address == BROADCAST && schema.requires_open {
            return Err(ConstructionError::BroadcastNotAllowed(command));
        }
        let mut params = [0; MAX_PARAMS_LEN];
        params[..parameters.len()].copy_from_slice(parameters);
        Ok(Self {
            address,
            command,
            params,
            params_len: parameters.len(),
        })
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub const fn command(&self) -> CommandCode {
        self.command
    }

    #[must_use]
    pub fn parameters(&self) -> &[u8] {
        &self.params[..self.params_len]
    }

    /// Number of bytes of the encoded request frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        let schema = self.command.schema();
        // address + request code + prefix + parameters + CRC
        2 + schema.prefix.len() + self.params_len + 2
    }
}

/// A verified response frame.
///
/// `payload` is everything between the address and the CRC.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'r> {
    pub address: Address,
    pub payload: &'r [u8],
}

/// Negative acknowledgment codes of a status frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nak {
    InvalidRequest,
    InternalError,
    AccessDenied,
    ClockAlreadyCorrected,
    ChannelNotOpen,
    Other(u8),
}

impl Nak {
    /// Interpret the status byte of a 4 byte status frame.
    ///
    /// Only the lower nibble carries the result; `0` means success.
    #[must_use]
    pub const fn from_status(status: u8) -> Option<Self> {
        let nak = match status & 0x0F {
            0x00 => return None,
            0x01 => Self::InvalidRequest,
            0x02 => Self::InternalError,
            0x03 => Self::AccessDenied,
            0x04 => Self::ClockAlreadyCorrected,
            0x05 => Self::ChannelNotOpen,
            code => Self::Other(code),
        };
        Some(nak)
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::InvalidRequest => 0x01,
            Self::InternalError => 0x02,
            Self::AccessDenied => 0x03,
            Self::ClockAlreadyCorrected => 0x04,
            Self::ChannelNotOpen => 0x05,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for Nak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "Invalid command or parameter"),
            Self::InternalError => write!(f, "Internal meter error"),
            Self::AccessDenied => write!(f, "Insufficient access level"),
            Self::ClockAlreadyCorrected => write!(f, "Clock already corrected today"),
            Self::ChannelNotOpen => write!(f, "Channel not open"),
            Self::Other(code) => write!(f, "Unknown status 0x{code:0>2X}"),
        }
    }
}

/// Access level requested when opening a channel.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    /// Read-only access.
    #[default]
    User = 0x01,
    /// Read/write access.
    Admin = 0x02,
}

impl AccessLevel {
    /// Factory password of this level.
    #[must_use]
    pub const fn default_password(self) -> Password {
        match self {
            Self::User => Password([1; 6]),
            Self::Admin => Password([2; 6]),
        }
    }
}

/// Six byte channel password.
///
/// Each byte holds the value of one digit, i.e. `"111111"` is sent as
/// `01 01 01 01 01 01`.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Password(pub [u8; 6]);

impl FromStr for Password {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 6 {
            return Err(ConstructionError::InvalidPassword);
        }
        let mut digits = [0; 6];
        for (digit, c) in digits.iter_mut().zip(bytes) {
            if !c.is_ascii_digit() {
                return Err(ConstructionError::InvalidPassword);
            }
            *digit = c - b'0';
        }
        Ok(Self(digits))
    }
}
