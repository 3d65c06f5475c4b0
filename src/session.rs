// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access channel of a single meter

use std::{fmt, time::Instant};

use crate::{
    client::{Client, ExchangeError},
    frame::*,
    transport::Transport,
};

/// State of the access channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Closed,
    Opening,
    Open,
}

/// Why a session could not be used.
#[derive(Debug)]
pub enum SessionError {
    /// The meter refused to open the channel, e.g. wrong password
    OpenRejected(Nak),
    /// The meter did not answer the open request
    OpenTimeout,
    Exchange(ExchangeError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OpenRejected(nak) => write!(f, "Opening channel rejected: {nak}"),
            Self::OpenTimeout => write!(f, "No answer to open channel request"),
            Self::Exchange(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exchange(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExchangeError> for SessionError {
    fn from(err: ExchangeError) -> Self {
        Self::Exchange(err)
    }
}

/// Credentials and channel state of one meter on the bus.
///
/// Meters close an idle channel on their own after some minutes. A read
/// that fails because of that reopens the channel once and repeats the
/// request.
#[derive(Debug, Clone)]
pub struct Session {
    address: Address,
    level: AccessLevel,
    password: Password,
    state: State,
    opened_at: Option<Instant>,
}

impl Session {
    /// Session with user access and the factory password.
    #[must_use]
    pub fn new(address: Address) -> Self {
        let level = AccessLevel::default();
        Self::with_credentials(address, level, level.default_password())
    }

    #[must_use]
    pub const fn with_credentials(address: Address, level: AccessLevel, password: Password) -> Self {
        Self {
            address,
            level,
            password,
            state: State::Closed,
            opened_at: None,
        }
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub const fn level(&self) -> AccessLevel {
        self.level
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// When the channel was opened last.
    #[must_use]
    pub const fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    /// Open the access channel.
    pub fn open<T: Transport>(&mut self, client: &mut Client<T>) -> Result<(), SessionError> {
        self.state = State::Opening;
        let cmd = Command::OpenChannel {
            level: self.level,
            password: self.password,
        };
        match client.execute(self, cmd) {
            Ok(_) => {
                self.state = State::Open;
                self.opened_at = Some(Instant::now());
                #[cfg(feature = "log")]
                log::info!("Opened channel to meter {} ({:?})", self.address, self.level);
                Ok(())
            }
            Err(err) => {
                self.state = State::Closed;
                #[cfg(feature = "log")]
                log::warn!("Failed to open channel to meter {}: {err}", self.address);
                Err(match err {
                    ExchangeError::Timeout => SessionError::OpenTimeout,
                    ExchangeError::Rejected(nak) => SessionError::OpenRejected(nak),
                    ExchangeError::ChannelClosed => {
                        SessionError::OpenRejected(Nak::ChannelNotOpen)
                    }
                    err => SessionError::Exchange(err),
                })
            }
        }
    }

    /// Read a value over the open channel.
    ///
    /// Fails with [`ExchangeError::ChannelNotOpen`] without any traffic if
    /// the channel has not been opened.
    pub fn read<T: Transport>(
        &mut self,
        client: &mut Client<T>,
        command: Command,
    ) -> Result<Measurement, SessionError> {
        match client.execute(self, command) {
            Err(ExchangeError::ChannelClosed) => {
                #[cfg(feature = "log")]
                log::info!("Meter {} closed the channel, reopening", self.address);
                self.state = State::Closed;
                self.opened_at = None;
                self.open(client)?;
                Ok(client.execute(self, command)?)
            }
            res => Ok(res?),
        }
    }

    /// Check that the meter answers.
    pub fn ping<T: Transport>(&self, client: &mut Client<T>) -> Result<(), SessionError> {
        client.execute(self, Command::TestChannel)?;
        Ok(())
    }

    /// Close the access channel.
    ///
    /// The session is closed afterwards even if the meter did not confirm.
    pub fn close<T: Transport>(&mut self, client: &mut Client<T>) -> Result<(), SessionError> {
        let res = client.execute(self, Command::CloseChannel);
        self.state = State::Closed;
        self.opened_at = None;
        #[cfg(feature = "log")]
        log::info!("Closed channel to meter {}", self.address);
        res?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn force_open(&mut self) {
        self.state = State::Open;
        self.opened_at = Some(Instant::now());
    }
}
