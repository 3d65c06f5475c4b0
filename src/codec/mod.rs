// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame encoding and decoding
//!
//! Every frame is `address || command-or-status || data || crc16`.
//! There are no delimiters or length fields, so both sides must know the
//! length of each frame in advance.

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    error::{ConstructionError, DecodeError},
    frame::*,
};

pub mod crc;
pub mod value;

use self::crc::{CRC_LEN, crc16};

type Result<T> = core::result::Result<T, DecodeError>;

/// Encode `address || body || crc` into `buf`.
///
/// Returns the number of bytes written.
pub fn encode_frame(
    address: Address,
    body: &[u8],
    buf: &mut [u8],
) -> core::result::Result<usize, ConstructionError> {
    let len = 1 + body.len() + CRC_LEN;
    if buf.len() < len {
        return Err(ConstructionError::BufferSize);
    }
    buf[0] = address;
    buf[1..=body.len()].copy_from_slice(body);
    let crc = crc16(&buf[..=body.len()]);
    LittleEndian::write_u16(&mut buf[1 + body.len()..len], crc);
    Ok(len)
}

/// Encode a 4 byte status frame.
pub fn encode_status(
    address: Address,
    status: u8,
    buf: &mut [u8],
) -> core::result::Result<usize, ConstructionError> {
    encode_frame(address, &[status], buf)
}

/// Encode a request.
pub fn encode_request(
    req: &Request,
    buf: &mut [u8],
) -> core::result::Result<usize, ConstructionError> {
    let schema = req.command().schema();
    let mut body = [0; 1 + MAX_PARAMS_LEN + 1];
    body[0] = schema.request;
    let prefix_end = 1 + schema.prefix.len();
    body[1..prefix_end].copy_from_slice(schema.prefix);
    let params = req.parameters();
    let body_len = prefix_end + params.len();
    body[prefix_end..body_len].copy_from_slice(params);
    let len = encode_frame(req.address(), &body[..body_len], buf)?;
    debug_assert_eq!(len, req.frame_len());
    Ok(len)
}

fn check_frame(buf: &[u8]) -> Result<()> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(DecodeError::Truncated(buf.len()));
    }
    let (data, _) = buf.split_at(buf.len() - CRC_LEN);
    let expected = crc::trailing_crc(buf).unwrap_or_default();
    let actual = crc16(data);
    if expected != actual {
        #[cfg(feature = "log")]
        log::debug!("Dropping frame with invalid CRC: {buf:02X?}");
        return Err(DecodeError::ChecksumMismatch(expected, actual));
    }
    Ok(())
}

/// Decode a request frame, e.g. on the meter side of a simulation.
///
/// A known command sent to an address it is not allowed for is reported as
/// [`DecodeError::InvalidRequest`].
pub fn decode_request(buf: &[u8]) -> Result<Request> {
    check_frame(buf)?;
    let body = &buf[1..buf.len() - CRC_LEN];
    let Some(schema) = find_schema(body) else {
        return Err(DecodeError::UnknownCommand(body[0]));
    };
    let params = &body[1 + schema.prefix.len()..];
    Request::new(buf[0], schema.code, params).map_err(DecodeError::InvalidRequest)
}

/// Decode the response to `command`.
///
/// A 4 byte frame is a status frame: with a non-zero status it decodes to
/// [`DecodeError::Nak`] regardless of the command.
pub fn decode_response(buf: &[u8], command: CommandCode) -> Result<Response<'_>> {
    check_frame(buf)?;
    let address = buf[0];
    let payload = &buf[1..buf.len() - CRC_LEN];
    if buf.len() == MIN_FRAME_LEN {
        if let Some(nak) = Nak::from_status(payload[0]) {
            #[cfg(feature = "log")]
            log::debug!("Meter {address} rejected {command:?}: {nak}");
            return Err(DecodeError::Nak(nak));
        }
    }
    let expected = command.response_len();
    if buf.len() != expected {
        return Err(DecodeError::BadLength(expected, buf.len()));
    }
    Ok(Response { address, payload })
}
