//! Blocking request/response exchanges with the device.
//!
//! A [`Session`] runs one exchange at a time. Each exchange goes
//! `Idle -> Sent -> AwaitingReply -> Decoded | Failed`; broadcasts skip
//! `Sent`. Nothing carries over from one exchange to the next, and nothing
//! is retried: resending a provide could apply a settings change twice.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::frame::{decode, encode, FrameHeader};
use crate::messages::{Query, Reply, Settings};
use crate::schema::{MessageSchema, SchemaRegistry};
use crate::transport::Transport;
use crate::types::{Decoded, Fields, Message, MessageKind, Role};

/// Timeouts applied by a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for a complete reply frame, header through checksum.
    pub reply_timeout: Duration,
    /// Quiet period that ends [`Session::discard_input`].
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Progress of a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Nothing sent yet.
    Idle,
    /// Request frame written.
    Sent,
    /// Blocked reading the reply.
    AwaitingReply,
    /// Reply decoded and correlated.
    Decoded,
    /// The exchange ended with an error.
    Failed,
}

struct Exchange {
    kind: MessageKind,
    role: Role,
    state: ExchangeState,
}

impl Exchange {
    fn new(kind: MessageKind, role: Role) -> Self {
        Exchange {
            kind,
            role,
            state: ExchangeState::Idle,
        }
    }

    fn advance(&mut self, next: ExchangeState) {
        trace!("{} {}: {:?} -> {:?}", self.role, self.kind, self.state, next);
        self.state = next;
    }
}

/// One end of the link, driving exchanges over a [`Transport`].
pub struct Session<'r, T> {
    transport: T,
    registry: &'r SchemaRegistry,
    config: SessionConfig,
    last_state: ExchangeState,
}

impl<T: Transport> Session<'static, T> {
    /// Create a session using the built-in message kinds.
    pub fn new(transport: T) -> Self {
        Session::with_registry(transport, SchemaRegistry::standard())
    }
}

impl<'r, T: Transport> Session<'r, T> {
    /// Create a session using a custom registry.
    pub fn with_registry(transport: T, registry: &'r SchemaRegistry) -> Self {
        Session {
            transport,
            registry,
            config: SessionConfig::default(),
            last_state: ExchangeState::Idle,
        }
    }

    /// Replace the timeouts.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Current timeouts.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registry used to resolve schemas.
    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Final state of the most recent exchange.
    pub fn last_state(&self) -> ExchangeState {
        self.last_state
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Push settings for `kind` and wait for the matching ack.
    pub fn provide(&mut self, kind: MessageKind, fields: &Fields) -> Result<(), ProtocolError> {
        self.last_state = ExchangeState::Idle;
        let schema = self.registry.schema(kind, Role::Provide)?;
        let ack = self.registry.schema(kind, Role::Ack)?;
        let frame = encode(&schema, fields)?;

        let mut exchange = Exchange::new(kind, Role::Provide);
        let result = self.transact(&mut exchange, Some(&frame), &ack).and_then(|reply| {
            // Decode against an ack for whatever id arrived, so a foreign
            // ack is reported as such once the frame itself checks out.
            let got = MessageKind(reply[MSP_ID_INDEX]);
            match decode(&reply, &MessageSchema::ack(got))? {
                Decoded::DeviceError { .. } => Err(ProtocolError::DeviceRejected { kind }),
                Decoded::Message(_) if got != kind => {
                    Err(ProtocolError::UnexpectedAck { got, want: kind })
                }
                Decoded::Message(_) => Ok(()),
            }
        });
        self.finish(exchange, result)
    }

    /// Query `kind` and return the decoded response.
    ///
    /// `params` is empty for kinds without a parameterised request.
    pub fn request(&mut self, kind: MessageKind, params: &Fields) -> Result<Message, ProtocolError> {
        self.last_state = ExchangeState::Idle;
        let schema = self.registry.schema(kind, Role::Request)?;
        let response = self.registry.schema(kind, Role::Response)?;
        let frame = encode(&schema, params)?;

        let mut exchange = Exchange::new(kind, Role::Request);
        let result = self
            .transact(&mut exchange, Some(&frame), &response)
            .and_then(|reply| accept(kind, decode(&reply, &response)?));
        self.finish(exchange, result)
    }

    /// Read one unsolicited frame of `kind`. Nothing is written.
    pub fn receive_broadcast(&mut self, kind: MessageKind) -> Result<Message, ProtocolError> {
        self.last_state = ExchangeState::Idle;
        let schema = self.registry.schema(kind, Role::Broadcast)?;

        let mut exchange = Exchange::new(kind, Role::Broadcast);
        let result = self
            .transact(&mut exchange, None, &schema)
            .and_then(|reply| accept(kind, decode(&reply, &schema)?));
        self.finish(exchange, result)
    }

    /// Provide a typed settings record.
    pub fn provide_record<S: Settings>(&mut self, record: &S) -> Result<(), ProtocolError> {
        self.provide(S::KIND, &record.to_fields())
    }

    /// Run a typed query.
    pub fn query<Q: Query>(&mut self, query: &Q) -> Result<Q::Reply, ProtocolError> {
        let message = self.request(<Q::Reply as Reply>::KIND, &query.params())?;
        Q::Reply::from_message(&message)
    }

    /// Receive one typed broadcast.
    pub fn receive_record<R: Reply>(&mut self) -> Result<R, ProtocolError> {
        let message = self.receive_broadcast(R::KIND)?;
        R::from_message(&message)
    }

    /// Throw away buffered input until the link stays quiet for the drain
    /// timeout. Returns the number of bytes discarded.
    ///
    /// Gives up after the reply timeout if the device never goes quiet.
    pub fn discard_input(&mut self) -> Result<usize, ProtocolError> {
        let deadline = Instant::now() + self.config.reply_timeout;
        let mut discarded = 0;
        loop {
            if Instant::now() >= deadline {
                warn!("input still arriving after discarding {} bytes", discarded);
                break;
            }
            match self.transport.read_exact(1, self.config.drain_timeout) {
                Ok(_) => discarded += 1,
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e.into()),
            }
        }
        if discarded > 0 {
            debug!("discarded {} stale bytes", discarded);
        }
        Ok(discarded)
    }

    /// Write `frame` (if any), then read exactly one reply frame.
    ///
    /// The header is read first and the frame is finished using its own size
    /// byte, so a reply that disagrees with `reply` is still consumed whole
    /// and the link stays aligned for the next exchange.
    fn transact(
        &mut self,
        exchange: &mut Exchange,
        frame: Option<&[u8]>,
        reply: &MessageSchema,
    ) -> Result<Vec<u8>, ProtocolError> {
        if let Some(frame) = frame {
            debug!("-> {} {} ({} bytes)", exchange.role, exchange.kind, frame.len());
            trace!("-> {:02X?}", frame);
            self.transport.write_all(frame)?;
            exchange.advance(ExchangeState::Sent);
        }

        exchange.advance(ExchangeState::AwaitingReply);
        let deadline = Instant::now() + self.config.reply_timeout;

        let mut data = self.transport.read_exact(MSP_HEADER_SIZE, self.config.reply_timeout)?;
        let header = FrameHeader::parse(&data)?;
        if !header.is_error() && header.size != reply.payload_size() {
            debug!(
                "{} {}: frame announces {} payload bytes, expected {}",
                exchange.role,
                exchange.kind,
                header.size,
                reply.payload_size()
            );
        }
        let remaining = header.size as usize + MSP_CHECKSUM_SIZE;
        let rest = self
            .transport
            .read_exact(remaining, deadline.saturating_duration_since(Instant::now()))?;
        data.extend_from_slice(&rest);

        trace!("<- {:02X?}", data);
        Ok(data)
    }

    fn finish<V>(
        &mut self,
        mut exchange: Exchange,
        result: Result<V, ProtocolError>,
    ) -> Result<V, ProtocolError> {
        match &result {
            Ok(_) => exchange.advance(ExchangeState::Decoded),
            Err(ProtocolError::DeviceRejected { kind }) => {
                warn!("device rejected {} {}", exchange.role, kind);
                exchange.advance(ExchangeState::Failed);
            }
            Err(e) => {
                debug!("{} {} failed: {}", exchange.role, exchange.kind, e);
                exchange.advance(ExchangeState::Failed);
            }
        }
        self.last_state = exchange.state;
        result
    }
}

fn accept(kind: MessageKind, decoded: Decoded) -> Result<Message, ProtocolError> {
    match decoded {
        Decoded::Message(message) => Ok(message),
        Decoded::DeviceError { .. } => Err(ProtocolError::DeviceRejected { kind }),
    }
}
