// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

use crate::frame::{CommandCode, Nak};

/// A request could not be built.
///
/// These are caller bugs and are never retried.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// Parameter length does not match the command schema
    ParameterLength(usize, usize),
    /// The broadcast address is not allowed for this command
    BroadcastNotAllowed(CommandCode),
    /// Invalid buffer size
    BufferSize,
    /// The meter offers no such quantity/phase combination
    UnsupportedReading,
    /// Invalid month for a monthly energy array
    InvalidMonth(u8),
    /// A password must consist of six decimal digits
    InvalidPassword,
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConstructionError::*;

        match self {
            ParameterLength(expected, actual) => write!(
                f,
                "Invalid parameter length: expected = {expected}, actual = {actual}"
            ),
            BroadcastNotAllowed(cmd) => {
                write!(f, "Broadcast address is not allowed for {cmd:?}")
            }
            BufferSize => write!(f, "Invalid buffer size"),
            UnsupportedReading => write!(f, "Unsupported quantity/phase combination"),
            InvalidMonth(month) => write!(f, "Invalid month: {month}"),
            InvalidPassword => write!(f, "Invalid password"),
        }
    }
}

/// A single received frame could not be turned into a value.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the smallest possible frame
    Truncated(usize),
    /// Invalid CRC
    ChecksumMismatch(u16, u16),
    /// The meter answered with a negative acknowledgment
    Nak(Nak),
    /// Length mismatch
    BadLength(usize, usize),
    /// A BCD byte with a nibble outside of `0..=9`
    BadDigit(u8),
    /// No layout is registered for this code
    UnknownCommand(u8),
    /// BCD digits that do not form a calendar date
    InvalidDateTime,
    /// A well-formed request frame that no client may send
    InvalidRequest(ConstructionError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DecodeError::*;

        match self {
            Truncated(len) => write!(f, "Truncated frame: {len} byte(s)"),
            ChecksumMismatch(expected, actual) => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            Nak(nak) => write!(f, "Negative acknowledgment: {nak}"),
            BadLength(expected, actual) => write!(
                f,
                "Length mismatch: expected = {expected}, actual = {actual}"
            ),
            BadDigit(byte) => write!(f, "Invalid BCD byte: 0x{byte:0>2X}"),
            UnknownCommand(code) => write!(f, "Unknown command: 0x{code:0>2X}"),
            InvalidDateTime => write!(f, "Invalid date/time"),
            InvalidRequest(err) => write!(f, "Invalid request: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConstructionError {}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_checksum_mismatch() {
        let err = DecodeError::ChecksumMismatch(0x03B6, 0x0001);
        assert_eq!(
            err.to_string(),
            "Invalid CRC: expected = 0x03B6, actual = 0x0001"
        );
    }

    #[test]
    fn display_invalid_request() {
        let err = DecodeError::InvalidRequest(ConstructionError::BroadcastNotAllowed(
            CommandCode::ReadTime,
        ));
        assert_eq!(
            err.to_string(),
            "Invalid request: Broadcast address is not allowed for ReadTime"
        );
    }

    #[test]
    fn display_nak() {
        let err = DecodeError::Nak(Nak::ChannelNotOpen);
        assert_eq!(err.to_string(), "Negative acknowledgment: Channel not open");
    }
}
