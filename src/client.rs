// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response exchange with retries

use std::{
    fmt, io,
    num::NonZeroU16,
    time::{Duration, Instant},
};

use crate::{
    codec::{self, value},
    error::{ConstructionError, DecodeError},
    frame::*,
    session::Session,
    transport::Transport,
};

/// Exchange settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Number of write/read cycles per request (at least one).
    pub attempts: u8,
    /// Time to wait for a complete response per attempt.
    pub timeout: Duration,
    /// Silence after which a partially received frame is complete.
    pub frame_gap: Duration,
    /// Instrument transformer ratio applied to energy, power and current.
    pub transformer_ratio: NonZeroU16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(1),
            frame_gap: Duration::from_millis(50),
            transformer_ratio: NonZeroU16::MIN,
        }
    }
}

/// Failure of one request.
#[derive(Debug)]
pub enum ExchangeError {
    /// No (complete) response within the retry budget
    Timeout,
    /// Only corrupted responses within the retry budget
    CorruptResponse,
    /// The meter refused the request
    Rejected(Nak),
    /// A verified response could not be interpreted
    DecodeFailed(DecodeError),
    /// The session of the addressed meter is not open
    ChannelNotOpen,
    /// The meter reported that the channel has been closed
    ChannelClosed,
    /// The request could not be built
    Construction(ConstructionError),
    /// Transport failure
    Io(io::Error),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ExchangeError::*;

        match self {
            Timeout => write!(f, "No response from meter"),
            CorruptResponse => write!(f, "Corrupted response from meter"),
            Rejected(nak) => write!(f, "Request rejected: {nak}"),
            DecodeFailed(err) => write!(f, "Invalid response: {err}"),
            ChannelNotOpen => write!(f, "Channel not open"),
            ChannelClosed => write!(f, "Channel closed by meter"),
            Construction(err) => write!(f, "Invalid request: {err}"),
            Io(err) => write!(f, "Transport error: {err}"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DecodeFailed(err) => Some(err),
            Self::Construction(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ExchangeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ConstructionError> for ExchangeError {
    fn from(err: ConstructionError) -> Self {
        Self::Construction(err)
    }
}

/// How a single attempt ended.
enum Attempt {
    Done(usize),
    Retry(ExchangeError),
    Fail(ExchangeError),
}

/// Protocol engine of one bus.
///
/// All exchanges take `&mut self`: a request is completed (or given up)
/// before the next one is sent. Meters sharing the bus share the client.
#[derive(Debug)]
pub struct Client<T> {
    transport: T,
    config: ClientConfig,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `command` to the meter of `session` and decode the answer.
    pub fn execute(
        &mut self,
        session: &Session,
        command: Command,
    ) -> Result<Measurement, ExchangeError> {
        let req = command.request(session.address())?;
        self.execute_request(session, &req)
    }

    /// Send a prepared request and decode the answer.
    ///
    /// Value reading requests are only sent if `session` is open and
    /// belongs to the addressed meter.
    pub fn execute_request(
        &mut self,
        session: &Session,
        req: &Request,
    ) -> Result<Measurement, ExchangeError> {
        if req.command().requires_open()
            && (!session.is_open() || session.address() != req.address())
        {
            return Err(ExchangeError::ChannelNotOpen);
        }
        let mut buf = [0; MAX_FRAME_LEN];
        let len = self.transact(req, &mut buf)?;
        let rsp = codec::decode_response(&buf[..len], req.command())
            .map_err(ExchangeError::DecodeFailed)?;
        let measurement = value::decode(req, rsp.payload).map_err(|err| {
            #[cfg(feature = "log")]
            log::error!("Failed to decode response to {:?}: {err}", req.command());
            ExchangeError::DecodeFailed(err)
        })?;
        Ok(measurement.apply_ratio(self.config.transformer_ratio))
    }

    /// Run the write/read cycle of `req` until a verified response is in
    /// `buf` or the retry budget is exhausted.
    ///
    /// Returns the length of the response frame.
    pub fn transact(&mut self, req: &Request, buf: &mut [u8]) -> Result<usize, ExchangeError> {
        let expected = req.command().response_len();
        if buf.len() < expected {
            return Err(ConstructionError::BufferSize.into());
        }
        let mut tx = [0; MAX_FRAME_LEN];
        let tx_len = codec::encode_request(req, &mut tx)?;
        let attempts = self.config.attempts.max(1);
        let mut failure = ExchangeError::Timeout;
        for attempt in 1..=attempts {
            self.transport.discard_input()?;
            #[cfg(feature = "log")]
            log::debug!("Sending {:02X?}", &tx[..tx_len]);
            self.transport.write(&tx[..tx_len])?;
            let len = self.receive(&mut buf[..expected])?;
            match check_response(req, &buf[..len]) {
                Attempt::Done(len) => return Ok(len),
                Attempt::Fail(err) => return Err(err),
                Attempt::Retry(err) => {
                    log_retry(req, attempt, attempts, &err);
                    failure = err;
                }
            }
        }
        Err(failure)
    }

    /// Read until `buf` is full, the attempt times out or the line falls
    /// silent after the first byte.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Instant::now() + self.config.timeout;
        let mut len = 0;
        while len < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let wait = if len == 0 {
                remaining
            } else {
                remaining.min(self.config.frame_gap)
            };
            let n = self.transport.read_with_timeout(&mut buf[len..], wait)?;
            if n == 0 {
                break;
            }
            len += n;
        }
        #[cfg(feature = "log")]
        {
            if len > 0 {
                log::debug!("Received {:02X?}", &buf[..len]);
            }
        }
        Ok(len)
    }
}

#[cfg_attr(not(feature = "log"), allow(unused_variables))]
fn log_retry(req: &Request, attempt: u8, attempts: u8, err: &ExchangeError) {
    #[cfg(feature = "log")]
    log::warn!(
        "Attempt {attempt}/{attempts} of {:?} to meter {} failed: {err}",
        req.command(),
        req.address()
    );
}

fn check_response(req: &Request, frame: &[u8]) -> Attempt {
    if frame.is_empty() {
        return Attempt::Retry(ExchangeError::Timeout);
    }
    match codec::decode_response(frame, req.command()) {
        Ok(rsp) if req.address() != BROADCAST && rsp.address != req.address() => {
            #[cfg(feature = "log")]
            log::warn!(
                "Response from meter {} to a request for meter {}",
                rsp.address,
                req.address()
            );
            Attempt::Retry(ExchangeError::CorruptResponse)
        }
        Ok(_) => Attempt::Done(frame.len()),
        Err(DecodeError::Truncated(_)) => Attempt::Retry(ExchangeError::Timeout),
        Err(DecodeError::ChecksumMismatch(_, _)) => {
            Attempt::Retry(ExchangeError::CorruptResponse)
        }
        Err(DecodeError::Nak(Nak::ChannelNotOpen)) => Attempt::Fail(ExchangeError::ChannelClosed),
        Err(DecodeError::Nak(nak)) => Attempt::Fail(ExchangeError::Rejected(nak)),
        Err(err) => Attempt::Fail(ExchangeError::DecodeFailed(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Reply, ScriptedTransport, corrupt, frame, status};

    const METER: Address = 0x2A;

    fn open_session() -> Session {
        let mut session = Session::new(METER);
        session.force_open();
        session
    }

    fn client(replies: impl IntoIterator<Item = Reply>) -> Client<ScriptedTransport> {
        Client::with_config(
            ScriptedTransport::new(replies),
            ClientConfig {
                timeout: Duration::from_millis(20),
                frame_gap: Duration::from_millis(5),
                ..Default::default()
            },
        )
    }

    const VOLTAGE: Command = Command::Read(Quantity::Voltage, Phase::L1);

    #[test]
    fn read_voltage() {
        let mut client = client([frame(METER, &[0x00, 0x14, 0x5A])]);
        let measurement = client.execute(&open_session(), VOLTAGE).unwrap();
        assert_eq!(
            measurement,
            Measurement::Instantaneous(Reading {
                quantity: Quantity::Voltage,
                phase: Phase::L1,
                value: Scaled::new(23_060, 2),
            })
        );
        let writes = &client.transport().writes;
        assert_eq!(writes.len(), 1);
        assert_eq!(&writes[0][..4], &[METER, 0x08, 0x11, 0x11]);
        assert!(codec::crc::verify(&writes[0]));
    }

    #[test]
    fn refuse_value_read_on_closed_channel() {
        let mut client = client([frame(METER, &[0x00, 0x14, 0x5A])]);
        let session = Session::new(METER);
        assert!(matches!(
            client.execute(&session, VOLTAGE),
            Err(ExchangeError::ChannelNotOpen)
        ));
        assert!(client.transport().writes.is_empty());
        assert_eq!(client.transport().discards, 0);
    }

    #[test]
    fn refuse_request_for_other_meter() {
        let mut client = client([]);
        let req = VOLTAGE.request(0x11).unwrap();
        assert!(matches!(
            client.execute_request(&open_session(), &req),
            Err(ExchangeError::ChannelNotOpen)
        ));
        assert!(client.transport().writes.is_empty());
    }

    #[test]
    fn retry_corrupted_responses() {
        let data = [0x00, 0x14, 0x5A];
        let mut client = client([
            corrupt(METER, &data),
            corrupt(METER, &data),
            frame(METER, &data),
        ]);
        let measurement = client.execute(&open_session(), VOLTAGE).unwrap();
        assert!(matches!(measurement, Measurement::Instantaneous(_)));
        assert_eq!(client.transport().writes.len(), 3);
    }

    #[test]
    fn give_up_after_corrupted_responses() {
        let data = [0x00, 0x14, 0x5A];
        let mut client = client([
            corrupt(METER, &data),
            corrupt(METER, &data),
            corrupt(METER, &data),
            frame(METER, &data),
        ]);
        assert!(matches!(
            client.execute(&open_session(), VOLTAGE),
            Err(ExchangeError::CorruptResponse)
        ));
        assert_eq!(client.transport().writes.len(), 3);
    }

    #[test]
    fn time_out_on_silent_meter() {
        let mut client = Client::with_config(
            ScriptedTransport::new([]).sleeping(),
            ClientConfig {
                attempts: 3,
                timeout: Duration::from_millis(30),
                ..Default::default()
            },
        );
        let start = Instant::now();
        assert!(matches!(
            client.execute(&open_session(), VOLTAGE),
            Err(ExchangeError::Timeout)
        ));
        let elapsed = start.elapsed();
        assert_eq!(client.transport().writes.len(), 3);
        assert!(elapsed >= Duration::from_millis(90));
        assert!(elapsed < Duration::from_millis(90 + 250));
    }

    #[test]
    fn retry_after_timeout() {
        let mut client = client([Reply::Silence, frame(METER, &[0x00, 0x14, 0x5A])]);
        assert!(client.execute(&open_session(), VOLTAGE).is_ok());
        assert_eq!(client.transport().writes.len(), 2);
    }

    #[test]
    fn retry_truncated_response() {
        let mut client = client([
            Reply::Bytes(vec![METER, 0x00]),
            frame(METER, &[0x00, 0x14, 0x5A]),
        ]);
        assert!(client.execute(&open_session(), VOLTAGE).is_ok());
        assert_eq!(client.transport().writes.len(), 2);
        // stale bytes are dropped before every attempt
        assert_eq!(client.transport().discards, 2);
    }

    #[test]
    fn retry_response_of_other_meter() {
        let mut client = client([
            frame(0x11, &[0x00, 0x14, 0x5A]),
            frame(METER, &[0x00, 0x14, 0x5A]),
        ]);
        assert!(client.execute(&open_session(), VOLTAGE).is_ok());
        assert_eq!(client.transport().writes.len(), 2);
    }

    #[test]
    fn do_not_retry_rejected_request() {
        let mut client = client([status(METER, 0x01), frame(METER, &[0x00, 0x14, 0x5A])]);
        assert!(matches!(
            client.execute(&open_session(), VOLTAGE),
            Err(ExchangeError::Rejected(Nak::InvalidRequest))
        ));
        assert_eq!(client.transport().writes.len(), 1);
    }

    #[test]
    fn report_closed_channel() {
        let mut client = client([status(METER, 0x05)]);
        assert!(matches!(
            client.execute(&open_session(), VOLTAGE),
            Err(ExchangeError::ChannelClosed)
        ));
        assert_eq!(client.transport().writes.len(), 1);
    }

    #[test]
    fn fail_on_unexpected_frame_length() {
        let mut client = client([frame(METER, &[0x00, 0x14])]);
        assert!(matches!(
            client.execute(&open_session(), VOLTAGE),
            Err(ExchangeError::DecodeFailed(DecodeError::BadLength(6, 5)))
        ));
        assert_eq!(client.transport().writes.len(), 1);
    }

    #[test]
    fn discover_address_by_broadcast() {
        let mut client = client([frame(METER, &[0x00, METER])]);
        let session = Session::new(BROADCAST);
        assert_eq!(
            client.execute(&session, Command::ReadNetworkAddress).unwrap(),
            Measurement::NetworkAddress(METER)
        );
    }

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.attempts, 3);
        assert_eq!(config.transformer_ratio.get(), 1);
    }

    #[test]
    fn apply_transformer_ratio() {
        let mut client = Client::with_config(
            ScriptedTransport::new([frame(METER, &[0x00, 0xE8, 0x03])]),
            ClientConfig {
                transformer_ratio: NonZeroU16::new(50).unwrap(),
                ..Default::default()
            },
        );
        let measurement = client
            .execute(&open_session(), Command::Read(Quantity::Current, Phase::L3))
            .unwrap();
        assert_eq!(
            measurement,
            Measurement::Instantaneous(Reading {
                quantity: Quantity::Current,
                phase: Phase::L3,
                value: Scaled::new(50_000, 3),
            })
        );
    }

    #[test]
    fn reject_construction_errors_without_io() {
        let mut client = client([]);
        assert!(matches!(
            client.execute(&open_session(), Command::Read(Quantity::Frequency, Phase::L2)),
            Err(ExchangeError::Construction(
                ConstructionError::UnsupportedReading
            ))
        ));
        assert!(client.transport().writes.is_empty());
    }
}
