// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted transport for exchange tests

use std::{collections::VecDeque, io, thread, time::Duration};

use super::Transport;
use crate::{codec, frame::*};

/// What the simulated meter sends after the next request.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Bytes(Vec<u8>),
    Silence,
}

/// A valid frame carrying `body`.
pub(crate) fn frame(address: Address, body: &[u8]) -> Reply {
    let mut buf = [0; MAX_FRAME_LEN];
    let len = codec::encode_frame(address, body, &mut buf).unwrap();
    Reply::Bytes(buf[..len].to_vec())
}

/// A status frame.
pub(crate) fn status(address: Address, status: u8) -> Reply {
    frame(address, &[status])
}

/// A frame carrying `body` with a broken checksum.
pub(crate) fn corrupt(address: Address, body: &[u8]) -> Reply {
    let Reply::Bytes(mut bytes) = frame(address, body) else {
        unreachable!();
    };
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    Reply::Bytes(bytes)
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: VecDeque<Reply>,
    pending: VecDeque<u8>,
    sleep_on_silence: bool,
    pub(crate) writes: Vec<Vec<u8>>,
    pub(crate) discards: usize,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Block for the whole timeout when nothing is pending, like a real port.
    pub(crate) fn sleeping(mut self) -> Self {
        self.sleep_on_silence = true;
        self
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writes.push(buf.to_vec());
        if let Some(Reply::Bytes(bytes)) = self.replies.pop_front() {
            self.pending.extend(bytes);
        }
        Ok(())
    }

    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if self.pending.is_empty() {
            if self.sleep_on_silence {
                thread::sleep(timeout);
            }
            return Ok(0);
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.discards += 1;
        self.pending.clear();
        Ok(())
    }
}
