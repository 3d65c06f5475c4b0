// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RS-485 access through a serial port

use std::{
    fmt,
    io::{self, Read, Write},
    str::FromStr,
    time::Duration,
};

use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};

use super::Transport;

/// Invalid serial line settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    BaudRate(u32),
    DataBits(u8),
    StopBits(u8),
    Parity(String),
    EmptyPath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError::*;

        match self {
            BaudRate(rate) => write!(f, "Invalid baud rate: {rate}"),
            DataBits(bits) => write!(f, "Invalid number of data bits: {bits} (5-8)"),
            StopBits(bits) => write!(f, "Invalid number of stop bits: {bits} (1-2)"),
            Parity(p) => write!(f, "Invalid parity: '{p}' (N, E or O)"),
            EmptyPath => write!(f, "No serial port given"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" | "n" => Ok(Self::None),
            "E" | "e" => Ok(Self::Even),
            "O" | "o" => Ok(Self::Odd),
            _ => Err(ConfigError::Parity(s.to_owned())),
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Even => Self::Even,
            Parity::Odd => Self::Odd,
        }
    }
}

/// Serial line settings.
///
/// Meters ship with 9600 baud 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// Default read timeout of the port.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_owned(),
            baud_rate: 9600,
            parity: Parity::None,
            data_bits: 8,
            stop_bits: 1,
            timeout: Duration::from_secs(1),
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::BaudRate(self.baud_rate));
        }
        data_bits(self.data_bits)?;
        stop_bits(self.stop_bits)?;
        Ok(())
    }
}

fn data_bits(bits: u8) -> Result<DataBits, ConfigError> {
    Ok(match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        _ => return Err(ConfigError::DataBits(bits)),
    })
}

fn stop_bits(bits: u8) -> Result<StopBits, ConfigError> {
    Ok(match bits {
        1 => StopBits::One,
        2 => StopBits::Two,
        _ => return Err(ConfigError::StopBits(bits)),
    })
}

/// A serial port attached to the bus.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port.name())
            .finish()
    }
}

impl SerialTransport {
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        config.validate().map_err(invalid_input)?;
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(data_bits(config.data_bits).map_err(invalid_input)?)
            .stop_bits(stop_bits(config.stop_bits).map_err(invalid_input)?)
            .parity(config.parity.into())
            .timeout(config.timeout)
            .open()?;
        #[cfg(feature = "log")]
        log::debug!(
            "Opened {} ({} {}{}{})",
            config.path,
            config.baud_rate,
            config.data_bits,
            match config.parity {
                Parity::None => 'N',
                Parity::Even => 'E',
                Parity::Odd => 'O',
            },
            config.stop_bits
        );
        Ok(Self { port })
    }

    pub fn into_inner(self) -> Box<dyn SerialPort> {
        self.port
    }
}

fn invalid_input(err: ConfigError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err)
}

impl Transport for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()
    }

    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            res => res,
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
