// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byte stream access to the bus

use std::{io, time::Duration};

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(test)]
pub(crate) mod mock;

/// A half-duplex byte channel.
///
/// The protocol engine owns its transport exclusively, so at most one
/// request is in flight per bus.
pub trait Transport {
    /// Write a complete frame.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout` for the first
    /// one.
    ///
    /// Returns `Ok(0)` if nothing arrived in time.
    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Drop bytes that arrived after the previous exchange was given up.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }

    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read_with_timeout(buf, timeout)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }

    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read_with_timeout(buf, timeout)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}
