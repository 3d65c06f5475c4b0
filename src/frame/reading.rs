// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

/// An instantaneous electrical quantity.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// W
    ActivePower,
    /// var
    ReactivePower,
    /// VA
    ApparentPower,
    /// V
    Voltage,
    /// A
    Current,
    /// Hz
    Frequency,
    /// Dimensionless
    PowerFactor,
}

impl Quantity {
    /// Bit of the first data byte that carries the direction (sign).
    #[must_use]
    pub const fn direction_bit(self) -> Option<u8> {
        match self {
            Self::ActivePower => Some(0x80),
            Self::ReactivePower => Some(0x40),
            _ => None,
        }
    }

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::ActivePower => "W",
            Self::ReactivePower => "var",
            Self::ApparentPower => "VA",
            Self::Voltage => "V",
            Self::Current => "A",
            Self::Frequency => "Hz",
            Self::PowerFactor => "",
        }
    }

    /// Scaled by an instrument transformer ratio.
    #[must_use]
    pub const fn follows_ratio(self) -> bool {
        matches!(
            self,
            Self::ActivePower | Self::ReactivePower | Self::ApparentPower | Self::Current
        )
    }
}

#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sum of all phases, or the single value of phase-less quantities.
    Sum,
    L1,
    L2,
    L3,
}

/// Decoding rule of one auxiliary parameter (BWRI byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxRule {
    pub bwri: u8,
    pub quantity: Quantity,
    pub phase: Phase,
    pub decimals: u8,
}

const fn rule(bwri: u8, quantity: Quantity, phase: Phase, decimals: u8) -> AuxRule {
    AuxRule {
        bwri,
        quantity,
        phase,
        decimals,
    }
}

/// Quantities read with [`CommandCode::ReadAuxiliary`].
pub static AUXILIARY: [AuxRule; 19] = {
    use Phase::*;
    use Quantity::*;
    [
        rule(0x00, ActivePower, Sum, 2),
        rule(0x01, ActivePower, L1, 2),
        rule(0x02, ActivePower, L2, 2),
        rule(0x03, ActivePower, L3, 2),
        rule(0x04, ReactivePower, Sum, 2),
        rule(0x05, ReactivePower, L1, 2),
        rule(0x06, ReactivePower, L2, 2),
        rule(0x07, ReactivePower, L3, 2),
        rule(0x08, ApparentPower, Sum, 2),
        rule(0x09, ApparentPower, L1, 2),
        rule(0x0A, ApparentPower, L2, 2),
        rule(0x0B, ApparentPower, L3, 2),
        rule(0x11, Voltage, L1, 2),
        rule(0x12, Voltage, L2, 2),
        rule(0x13, Voltage, L3, 2),
        rule(0x21, Current, L1, 3),
        rule(0x22, Current, L2, 3),
        rule(0x23, Current, L3, 3),
        rule(0x40, Frequency, Sum, 2),
    ]
};

/// Quantities read with [`CommandCode::ReadPowerFactor`].
pub static POWER_FACTOR: [AuxRule; 4] = [
    rule(0x30, Quantity::PowerFactor, Phase::Sum, 3),
    rule(0x31, Quantity::PowerFactor, Phase::L1, 3),
    rule(0x32, Quantity::PowerFactor, Phase::L2, 3),
    rule(0x33, Quantity::PowerFactor, Phase::L3, 3),
];

/// Find the rule of a BWRI byte.
#[must_use]
pub fn find_rule(rules: &[AuxRule], bwri: u8) -> Option<&AuxRule> {
    rules.iter().find(|r| r.bwri == bwri)
}

/// Find the command and BWRI byte that read `quantity` on `phase`.
#[must_use]
pub fn lookup_reading(quantity: Quantity, phase: Phase) -> Option<(CommandCode, u8)> {
    [
        (CommandCode::ReadAuxiliary, &AUXILIARY[..]),
        (CommandCode::ReadPowerFactor, &POWER_FACTOR[..]),
    ]
    .into_iter()
    .find_map(|(cmd, rules)| {
        rules
            .iter()
            .find(|r| r.quantity == quantity && r.phase == phase)
            .map(|r| (cmd, r.bwri))
    })
}

/// Energy tariff bucket.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tariff {
    /// Sum over all tariffs.
    #[default]
    Total = 0,
    T1 = 1,
    T2 = 2,
    T3 = 3,
    T4 = 4,
}

impl Tariff {
    pub const ALL: [Tariff; 5] = [Self::Total, Self::T1, Self::T2, Self::T3, Self::T4];

    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Total),
            1 => Some(Self::T1),
            2 => Some(Self::T2),
            3 => Some(Self::T3),
            4 => Some(Self::T4),
            _ => None,
        }
    }
}

/// Accumulation period of an energy reading.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyArray {
    #[default]
    FromReset,
    CurrentYear,
    PreviousYear,
    /// Month `1..=12` of the current year.
    Month(u8),
    Today,
    Yesterday,
}

impl EnergyArray {
    /// Array number in the upper nibble, month in the lower nibble.
    pub const fn to_param(self) -> Result<u8, ConstructionError> {
        let param = match self {
            Self::FromReset => 0x00,
            Self::CurrentYear => 0x10,
            Self::PreviousYear => 0x20,
            Self::Month(month) => {
                if month < 1 || month > 12 {
                    return Err(ConstructionError::InvalidMonth(month));
                }
                0x30 | month
            }
            Self::Today => 0x40,
            Self::Yesterday => 0x50,
        };
        Ok(param)
    }

    #[must_use]
    pub const fn from_param(param: u8) -> Option<Self> {
        let array = match param >> 4 {
            0x0 => Self::FromReset,
            0x1 => Self::CurrentYear,
            0x2 => Self::PreviousYear,
            0x3 => {
                let month = param & 0x0F;
                if month < 1 || month > 12 {
                    return None;
                }
                Self::Month(month)
            }
            0x4 => Self::Today,
            0x5 => Self::Yesterday,
            _ => return None,
        };
        Some(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bwri_bytes_are_unique() {
        for rules in [&AUXILIARY[..], &POWER_FACTOR[..]] {
            for (i, a) in rules.iter().enumerate() {
                assert!(rules[i + 1..].iter().all(|b| b.bwri != a.bwri));
            }
        }
    }

    #[test]
    fn lookup_readings() {
        assert_eq!(
            lookup_reading(Quantity::Voltage, Phase::L2),
            Some((CommandCode::ReadAuxiliary, 0x12))
        );
        assert_eq!(
            lookup_reading(Quantity::Frequency, Phase::Sum),
            Some((CommandCode::ReadAuxiliary, 0x40))
        );
        assert_eq!(
            lookup_reading(Quantity::PowerFactor, Phase::L3),
            Some((CommandCode::ReadPowerFactor, 0x33))
        );
        assert_eq!(
            find_rule(&AUXILIARY, 0x21).map(|r| r.quantity),
            Some(Quantity::Current)
        );
        assert!(find_rule(&AUXILIARY, 0x77).is_none());
    }

    #[test]
    fn energy_array_params() {
        assert_eq!(EnergyArray::FromReset.to_param(), Ok(0x00));
        assert_eq!(EnergyArray::Month(12).to_param(), Ok(0x3C));
        assert_eq!(
            EnergyArray::Month(13).to_param(),
            Err(ConstructionError::InvalidMonth(13))
        );
        assert_eq!(
            EnergyArray::Month(0).to_param(),
            Err(ConstructionError::InvalidMonth(0))
        );
        assert_eq!(EnergyArray::from_param(0x3C), Some(EnergyArray::Month(12)));
        assert_eq!(EnergyArray::from_param(0x50), Some(EnergyArray::Yesterday));
        assert_eq!(EnergyArray::from_param(0x30), None);
        assert_eq!(EnergyArray::from_param(0x60), None);
    }

    #[test]
    fn tariff_from_u8() {
        assert_eq!(Tariff::new(0), Some(Tariff::Total));
        assert_eq!(Tariff::new(4), Some(Tariff::T4));
        assert_eq!(Tariff::new(5), None);
    }
}
