// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interpretation of response payloads

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;

use crate::{error::DecodeError, frame::*};

type Result<T> = core::result::Result<T, DecodeError>;

/// Energy registers count watt hours.
const ENERGY_DECIMALS: u8 = 3;

/// Value of an energy register the meter does not support.
const UNSUPPORTED_REGISTER: u32 = 0xFFFF_FFFF;

/// Decode the payload of the response to `req`.
pub fn decode(req: &Request, payload: &[u8]) -> Result<Measurement> {
    let layout = req.command().schema().layout;
    let expected = layout.payload_len();
    if payload.len() != expected {
        return Err(DecodeError::BadLength(expected, payload.len()));
    }
    let params = req.parameters();
    match layout {
        Layout::Status => Ok(Measurement::Ack),
        Layout::NetworkAddress => Ok(Measurement::NetworkAddress(payload[1])),
        Layout::Energy { width, .. } => decode_energy(params, payload, width).map(Measurement::Energy),
        Layout::Auxiliary(rules) => {
            let bwri = params[0];
            let rule = find_rule(rules, bwri).ok_or(DecodeError::UnknownCommand(bwri))?;
            Ok(Measurement::Instantaneous(decode_auxiliary(rule, payload)))
        }
        Layout::DateTime => decode_datetime(payload).map(Measurement::Timestamp),
    }
}

fn decode_energy(params: &[u8], payload: &[u8], width: usize) -> Result<EnergyTotals> {
    let array = EnergyArray::from_param(params[0]).ok_or(DecodeError::UnknownCommand(params[0]))?;
    let tariff = Tariff::new(params[1]).ok_or(DecodeError::UnknownCommand(params[1]))?;
    let mut registers = payload.chunks_exact(width).map(|chunk| {
        let raw = word_swapped_u32(chunk);
        (raw != UNSUPPORTED_REGISTER).then(|| Scaled::new(i64::from(raw), ENERGY_DECIMALS))
    });
    Ok(EnergyTotals {
        array,
        tariff,
        active_import: registers.next().flatten(),
        active_export: registers.next().flatten(),
        reactive_import: registers.next().flatten(),
        reactive_export: registers.next().flatten(),
    })
}

/// Energy registers are sent as `b2 b3 b0 b1` (high word first, each word
/// little endian).
fn word_swapped_u32(bytes: &[u8]) -> u32 {
    let hi = LittleEndian::read_u16(&bytes[0..2]);
    let lo = LittleEndian::read_u16(&bytes[2..4]);
    u32::from(hi) << 16 | u32::from(lo)
}

/// The upper two bits of the first byte carry the active and reactive
/// power direction, the remaining 22 bits the absolute value.
fn decode_auxiliary(rule: &AuxRule, payload: &[u8]) -> Reading {
    let flags = payload[0];
    let abs = u32::from(flags & 0x3F) << 16 | u32::from(LittleEndian::read_u16(&payload[1..3]));
    let negative = rule
        .quantity
        .direction_bit()
        .is_some_and(|bit| flags & bit != 0);
    let raw = if negative {
        -i64::from(abs)
    } else {
        i64::from(abs)
    };
    Reading {
        quantity: rule.quantity,
        phase: rule.phase,
        value: Scaled::new(raw, rule.decimals),
    }
}

/// Decode one packed BCD byte, e.g. `0x59` to `59`.
pub fn decode_bcd(byte: u8) -> Result<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    if hi > 9 || lo > 9 {
        return Err(DecodeError::BadDigit(byte));
    }
    Ok(hi * 10 + lo)
}

/// second, minute, hour, weekday, day, month, year, season
///
/// The season byte is `0` for summer and `1` for winter time.
fn decode_datetime(payload: &[u8]) -> Result<MeterTime> {
    let mut digits = [0u8; 7];
    for (digit, byte) in digits.iter_mut().zip(payload) {
        *digit = decode_bcd(*byte)?;
    }
    let [second, minute, hour, weekday, day, month, year] = digits;
    let datetime = NaiveDate::from_ymd_opt(
        2000 + i32::from(year),
        u32::from(month),
        u32::from(day),
    )
    .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
    .ok_or(DecodeError::InvalidDateTime)?;
    let winter = match payload[7] {
        0 => false,
        1 => true,
        _ => return Err(DecodeError::InvalidDateTime),
    };
    Ok(MeterTime {
        datetime,
        weekday,
        winter,
    })
}
