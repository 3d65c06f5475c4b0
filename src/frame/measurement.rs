// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::num::NonZeroU16;

use chrono::NaiveDateTime;

use super::*;

const POW10: [i64; 7] = [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000];

/// A fixed point value: `raw / 10^decimals`.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaled {
    pub raw: i64,
    pub decimals: u8,
}

impl Scaled {
    #[must_use]
    pub const fn new(raw: i64, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.raw as f64 / POW10[usize::from(self.decimals)] as f64
    }

    /// Multiply with an instrument transformer ratio.
    ///
    /// Meter values span at most 32 bits, so a 16 bit ratio never reaches
    /// the saturation bound.
    #[must_use]
    pub const fn times(self, ratio: NonZeroU16) -> Self {
        Self {
            raw: self.raw.saturating_mul(ratio.get() as i64),
            decimals: self.decimals,
        }
    }
}

impl fmt::Display for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.raw);
        }
        let divisor = POW10[usize::from(self.decimals)].unsigned_abs();
        let abs = self.raw.unsigned_abs();
        let sign = if self.raw < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = usize::from(self.decimals)
        )
    }
}

/// Energy registers of one array and tariff in kWh (kvarh).
///
/// `None` marks a register the meter does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyTotals {
    pub array: EnergyArray,
    pub tariff: Tariff,
    pub active_import: Option<Scaled>,
    pub active_export: Option<Scaled>,
    pub reactive_import: Option<Scaled>,
    pub reactive_export: Option<Scaled>,
}

/// An instantaneous electrical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub quantity: Quantity,
    pub phase: Phase,
    pub value: Scaled,
}

/// Date and time of the meter clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterTime {
    pub datetime: NaiveDateTime,
    /// Day of week as reported by the meter (`1` = Monday).
    pub weekday: u8,
    /// Winter time is active.
    pub winter: bool,
}

/// A decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// The command was acknowledged.
    Ack,
    NetworkAddress(Address),
    Energy(EnergyTotals),
    Instantaneous(Reading),
    Timestamp(MeterTime),
}

impl Measurement {
    /// Apply an instrument transformer ratio to energy, power and current.
    #[must_use]
    pub fn apply_ratio(self, ratio: NonZeroU16) -> Self {
        if ratio == NonZeroU16::MIN {
            return self;
        }
        match self {
            Self::Energy(totals) => {
                let scale = |v: Option<Scaled>| v.map(|v| v.times(ratio));
                Self::Energy(EnergyTotals {
                    active_import: scale(totals.active_import),
                    active_export: scale(totals.active_export),
                    reactive_import: scale(totals.reactive_import),
                    reactive_export: scale(totals.reactive_export),
                    ..totals
                })
            }
            Self::Instantaneous(reading) if reading.quantity.follows_ratio() => {
                Self::Instantaneous(Reading {
                    value: reading.value.times(ratio),
                    ..reading
                })
            }
            other => other,
        }
    }
}
