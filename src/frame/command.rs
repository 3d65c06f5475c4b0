// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

/// A meter command.
///
/// The discriminant is the index into [`SCHEMAS`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Request code: `0x00`
    TestChannel = 0,
    /// Request code: `0x01`
    OpenChannel = 1,
    /// Request code: `0x02`
    CloseChannel = 2,
    /// Request code: `0x04 0x00`
    ReadTime = 3,
    /// Request code: `0x05`
    ReadEnergy = 4,
    /// Request code: `0x08 0x05`
    ReadNetworkAddress = 5,
    /// Request code: `0x08 0x11`
    ReadAuxiliary = 6,
    /// Request code: `0x08 0x16`
    ReadPowerFactor = 7,
}

impl CommandCode {
    #[must_use]
    pub fn schema(self) -> &'static Schema {
        &SCHEMAS[self as usize]
    }

    /// Length of the complete response frame.
    #[must_use]
    pub fn response_len(self) -> usize {
        self.schema().response_len()
    }

    /// Whether the meter only answers this command on an open channel.
    #[must_use]
    pub fn requires_open(self) -> bool {
        self.schema().requires_open
    }
}

/// How the payload of a response is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Status frame without data.
    Status,
    /// `0x00` followed by the network address.
    NetworkAddress,
    /// Word swapped `u32` energy registers.
    Energy { registers: usize, width: usize },
    /// 3 byte value selected by the BWRI parameter.
    Auxiliary(&'static [AuxRule]),
    /// Packed BCD date and time.
    DateTime,
}

impl Layout {
    /// Number of data bytes between address and CRC.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        match *self {
            Self::Status => 1,
            Self::NetworkAddress => 2,
            Self::Energy { registers, width } => registers * width,
            Self::Auxiliary(_) => 3,
            Self::DateTime => 8,
        }
    }
}

/// Fixed wire properties of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub code: CommandCode,
    /// Request code byte
    pub request: u8,
    /// Parameter bytes that are always sent
    pub prefix: &'static [u8],
    /// Number of variable parameter bytes
    pub params_len: usize,
    pub requires_open: bool,
    pub layout: Layout,
}

impl Schema {
    /// Length of the complete response frame.
    #[must_use]
    pub const fn response_len(&self) -> usize {
        1 + self.layout.payload_len() + 2
    }
}

pub static SCHEMAS: [Schema; 8] = [
    Schema {
        code: CommandCode::TestChannel,
        request: 0x00,
        prefix: &[],
        params_len: 0,
        requires_open: false,
        layout: Layout::Status,
    },
    Schema {
        code: CommandCode::OpenChannel,
        request: 0x01,
        prefix: &[],
        params_len: 7,
        requires_open: false,
        layout: Layout::Status,
    },
    Schema {
        code: CommandCode::CloseChannel,
        request: 0x02,
        prefix: &[],
        params_len: 0,
        requires_open: false,
        layout: Layout::Status,
    },
    Schema {
        code: CommandCode::ReadTime,
        request: 0x04,
        prefix: &[0x00],
        params_len: 0,
        requires_open: true,
        layout: Layout::DateTime,
    },
    Schema {
        code: CommandCode::ReadEnergy,
        request: 0x05,
        prefix: &[],
        params_len: 2,
        requires_open: true,
        layout: Layout::Energy {
            registers: 4,
            width: 4,
        },
    },
    Schema {
        code: CommandCode::ReadNetworkAddress,
        request: 0x08,
        prefix: &[0x05],
        params_len: 0,
        requires_open: false,
        layout: Layout::NetworkAddress,
    },
    Schema {
        code: CommandCode::ReadAuxiliary,
        request: 0x08,
        prefix: &[0x11],
        params_len: 1,
        requires_open: true,
        layout: Layout::Auxiliary(&AUXILIARY),
    },
    Schema {
        code: CommandCode::ReadPowerFactor,
        request: 0x08,
        prefix: &[0x16],
        params_len: 1,
        requires_open: true,
        layout: Layout::Auxiliary(&POWER_FACTOR),
    },
];

/// Find the schema of an encoded request body (request code, prefix and
/// parameters).
#[must_use]
pub fn find_schema(body: &[u8]) -> Option<&'static Schema> {
    let (&request, rest) = body.split_first()?;
    SCHEMAS.iter().find(|s| {
        s.request == request
            && rest.len() == s.prefix.len() + s.params_len
            && rest.starts_with(s.prefix)
    })
}

/// A typed meter command.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TestChannel,
    OpenChannel {
        level: AccessLevel,
        password: Password,
    },
    CloseChannel,
    ReadTime,
    ReadEnergy {
        array: EnergyArray,
        tariff: Tariff,
    },
    ReadNetworkAddress,
    Read(Quantity, Phase),
}

impl Command {
    /// Build the request for the meter at `address`.
    pub fn request(self, address: Address) -> Result<Request, ConstructionError> {
        match self {
            Self::TestChannel => Request::new(address, CommandCode::TestChannel, &[]),
            Self::OpenChannel { level, password } => {
                let mut params = [0; 7];
                params[0] = level as u8;
                params[1..].copy_from_slice(&password.0);
                Request::new(address, CommandCode::OpenChannel, &params)
            }
            Self::CloseChannel => Request::new(address, CommandCode::CloseChannel, &[]),
            Self::ReadTime => Request::new(address, CommandCode::ReadTime, &[]),
            Self::ReadEnergy { array, tariff } => Request::new(
                address,
                CommandCode::ReadEnergy,
                &[array.to_param()?, tariff as u8],
            ),
            Self::ReadNetworkAddress => {
                Request::new(address, CommandCode::ReadNetworkAddress, &[])
            }
            Self::Read(quantity, phase) => {
                let (code, bwri) =
                    lookup_reading(quantity, phase).ok_or(ConstructionError::UnsupportedReading)?;
                Request::new(address, code, &[bwri])
            }
        }
    }
}
