// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod codec;
mod error;
mod frame;

#[cfg(feature = "std")]
pub mod client;
#[cfg(feature = "std")]
pub mod session;
#[cfg(feature = "std")]
pub mod transport;

#[cfg(feature = "std")]
pub use self::{
    client::{Client, ClientConfig, ExchangeError},
    session::{Session, SessionError, State},
    transport::Transport,
};
pub use self::{error::*, frame::*};
