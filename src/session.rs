//! Transport session: one serial channel, one request in flight.
//!
//! The [`Session`] owns both halves of the channel:
//! 1. A reader task feeds every incoming byte through a [`FrameDecoder`] and forwards
//!    decoded events over an mpsc queue
//! 2. An exchange slot (FIFO-fair async mutex) serializes requests; only its holder writes
//!    and consumes responses
//!
//! ```text
//! caller ─┐                              ┌─► write frame ─► serial ─┐
//! caller ─┼─► exchange slot (1 holder) ──┤                          │
//! caller ─┘                              └◄─ mpsc ◄─ reader task ◄──┘
//! ```
//!
//! Lifecycle: `Idle ⇄ AwaitingResponse`, and `Closed` from anywhere on [`Session::close`],
//! EOF, an I/O error, or a protocol violation. A closed session never reopens.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use neural_link::{protocol::CommandCode, Session};
//!
//! let session = Session::open("/dev/ttyUSB0", 115_200, Duration::from_millis(500))?;
//! let frame = session.request(CommandCode::GetTrust, &[]).await?;
//! session.close().await?;
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::config::{BusyMode, CorrelationMode, SessionConfig, DEFAULT_INBOUND_CAPACITY};
use crate::error::TransportError;
use crate::protocol::{encode, CommandCode, Frame, FrameDecoder, FrameEvent, PONG_CODE};
use crate::transport::{PortLease, SerialLink};

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Open, nothing in flight.
    Idle = 1,
    /// Open, a request is waiting for its response.
    AwaitingResponse = 2,
    /// Terminal.
    Closed = 3,
}

/// Lock-free holder for [`SessionState`]. `Closed` is sticky.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(SessionState::Idle as u8))
    }

    fn get(&self) -> SessionState {
        match self.0.load(Ordering::Acquire) {
            1 => SessionState::Idle,
            2 => SessionState::AwaitingResponse,
            _ => SessionState::Closed,
        }
    }

    /// Move `from` → `to`; no-op if the state is something else.
    fn transition(&self, from: SessionState, to: SessionState) {
        let _ = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Close. Returns `false` if already closed.
    fn close(&self) -> bool {
        self.0.swap(SessionState::Closed as u8, Ordering::AcqRel) != SessionState::Closed as u8
    }
}

/// Marks the session busy for the lifetime of one exchange.
struct InFlight<'a>(&'a StateCell);

impl<'a> InFlight<'a> {
    fn begin(cell: &'a StateCell) -> Self {
        cell.transition(SessionState::Idle, SessionState::AwaitingResponse);
        Self(cell)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0
            .transition(SessionState::AwaitingResponse, SessionState::Idle);
    }
}

/// What the reader task hands to the session.
#[derive(Debug)]
enum Inbound {
    Frame(Frame),
    Corrupt,
    Closed,
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// State owned by whoever holds the exchange slot.
struct Exchange {
    writer: Option<BoxedWriter>,
    inbound: mpsc::Receiver<Inbound>,
    /// Deadline of an exchange whose caller went away before its response arrived.
    stale_until: Option<Instant>,
    /// Response code the in-flight request expects.
    in_flight: Option<u8>,
    /// Response code of the last exchange that ended without its response.
    abandoned: Option<u8>,
}

impl Exchange {
    /// Clear leftovers from earlier exchanges before a new request goes out.
    async fn settle(&mut self) -> Result<(), TransportError> {
        if let Some(code) = self.in_flight.take() {
            self.abandoned = Some(code);
        }
        if let Some(until) = self.stale_until {
            loop {
                match timeout_at(until, self.inbound.recv()).await {
                    Err(_) => break,
                    Ok(None) | Ok(Some(Inbound::Closed)) => return Err(TransportError::ChannelClosed),
                    Ok(Some(Inbound::Corrupt)) => continue,
                    Ok(Some(Inbound::Frame(frame))) => {
                        tracing::debug!(
                            "Discarded late response 0x{:02X} from cancelled request",
                            frame.command()
                        );
                        self.abandoned = None;
                        break;
                    }
                }
            }
            self.stale_until = None;
        }

        loop {
            match self.inbound.try_recv() {
                Ok(Inbound::Frame(frame)) if self.abandoned == Some(frame.command()) => {
                    tracing::debug!("Discarded late response 0x{:02X}", frame.command());
                    self.abandoned = None;
                }
                Ok(Inbound::Frame(frame)) => {
                    tracing::warn!("Discarded unsolicited frame 0x{:02X}", frame.command());
                }
                Ok(Inbound::Corrupt) => {}
                Ok(Inbound::Closed) | Err(TryRecvError::Disconnected) => {
                    return Err(TransportError::ChannelClosed)
                }
                Err(TryRecvError::Empty) => return Ok(()),
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::ChannelClosed)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn await_response(
        &mut self,
        command: CommandCode,
        deadline: Instant,
        mode: CorrelationMode,
    ) -> Result<Frame, TransportError> {
        let mut saw_corrupt = false;

        loop {
            let inbound = match timeout_at(deadline, self.inbound.recv()).await {
                Ok(Some(inbound)) => inbound,
                Ok(None) => return Err(TransportError::ChannelClosed),
                Err(_) if saw_corrupt => return Err(TransportError::Corrupt),
                Err(_) => return Err(TransportError::Timeout),
            };

            match inbound {
                Inbound::Closed => return Err(TransportError::ChannelClosed),
                Inbound::Corrupt => {
                    tracing::debug!("Corrupt frame while awaiting {}", command);
                    saw_corrupt = true;
                }
                Inbound::Frame(frame) => {
                    let code = frame.command();
                    if code != command.response_code() && self.abandoned == Some(code) {
                        tracing::debug!("Discarded late response 0x{:02X}", code);
                        self.abandoned = None;
                        continue;
                    }

                    return match correlate(command, &frame, mode) {
                        Correlation::Match => Ok(frame),
                        Correlation::Fallback => {
                            tracing::warn!(
                                "Accepting response code 0x{:02X} for {} (expected 0x{:02X})",
                                frame.command(),
                                command,
                                command.response_code()
                            );
                            Ok(frame)
                        }
                        Correlation::Stray => {
                            tracing::warn!(
                                "Discarded stray frame 0x{:02X} while awaiting {}",
                                code,
                                command
                            );
                            continue;
                        }
                        Correlation::Mismatch => Err(TransportError::UnexpectedCommand {
                            expected: command,
                            actual: frame.command(),
                        }),
                    };
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Correlation {
    Match,
    /// Unknown code, accepted in lenient mode.
    Fallback,
    /// Another command's response, dropped in lenient mode.
    Stray,
    Mismatch,
}

/// Whether `code` is the response code of some known command.
fn is_known_response(code: u8) -> bool {
    code == PONG_CODE || CommandCode::try_from(code).is_ok()
}

fn correlate(command: CommandCode, frame: &Frame, mode: CorrelationMode) -> Correlation {
    let code = frame.command();
    if code == command.response_code() {
        Correlation::Match
    } else if mode == CorrelationMode::Strict {
        Correlation::Mismatch
    } else if is_known_response(code) {
        Correlation::Stray
    } else if command == CommandCode::Ping {
        Correlation::Mismatch
    } else {
        Correlation::Fallback
    }
}

struct Shared {
    exchange: Mutex<Exchange>,
    state: Arc<StateCell>,
    config: SessionConfig,
    reader: JoinHandle<()>,
    lease: std::sync::Mutex<Option<PortLease>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Builder for configuring and opening a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Start from defaults with the given request timeout.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            config: SessionConfig::new(request_timeout),
        }
    }

    /// Start from a full config.
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Set the serial baud rate.
    ///
    /// Default: 115200
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Queue or reject concurrent requests.
    ///
    /// Default: queue
    pub fn busy_mode(mut self, mode: BusyMode) -> Self {
        self.config.busy_mode = mode;
        self
    }

    /// Set the response matching policy.
    ///
    /// Default: lenient
    pub fn correlation(mut self, mode: CorrelationMode) -> Self {
        self.config.correlation = mode;
        self
    }

    /// Reject incoming headers declaring more than `max_payload` bytes.
    ///
    /// Default: 65535
    pub fn max_payload(mut self, max_payload: u16) -> Self {
        self.config.max_payload = max_payload;
        self
    }

    /// Set the reader task's read buffer size.
    ///
    /// Default: 1024
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size.max(1);
        self
    }

    /// Open the serial device at `port` and start the session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(mut self, port: &str) -> Result<Session, TransportError> {
        let link = SerialLink::open(port, self.config.baud_rate)?;
        self.config.port = Some(port.to_string());
        let (stream, lease) = link.into_parts();
        Ok(Session::start(stream, self.config, Some(lease)))
    }

    /// Run the session over an already-open stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach<S>(self, stream: S) -> Session
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Session::start(stream, self.config, None)
    }
}

/// A serial channel to one Neural Unit.
///
/// Cheap to clone; clones share the channel and its single exchange slot.
/// The channel is released when [`close`](Self::close) is called or the last clone drops.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Create a session builder.
    pub fn builder(request_timeout: Duration) -> SessionBuilder {
        SessionBuilder::new(request_timeout)
    }

    /// Open the serial device at `port` with default settings.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        SessionBuilder::new(timeout).baud_rate(baud_rate).open(port)
    }

    /// Run a session over any byte stream.
    pub fn from_stream<S>(stream: S, config: SessionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(stream, config, None)
    }

    fn start<S>(stream: S, config: SessionConfig, lease: Option<PortLease>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(DEFAULT_INBOUND_CAPACITY);
        let state = Arc::new(StateCell::new());

        let decoder = FrameDecoder::with_max_payload(config.max_payload);
        let reader_task = tokio::spawn(Self::read_loop(
            reader,
            tx,
            decoder,
            config.read_buffer_size.max(1),
            state.clone(),
        ));

        Self {
            shared: Arc::new(Shared {
                exchange: Mutex::new(Exchange {
                    writer: Some(Box::new(writer)),
                    inbound: rx,
                    stale_until: None,
                    in_flight: None,
                    abandoned: None,
                }),
                state,
                config,
                reader: reader_task,
                lease: std::sync::Mutex::new(lease),
            }),
        }
    }

    /// Reader task - decodes incoming bytes and forwards events to the session.
    async fn read_loop<R: AsyncRead + Unpin>(
        mut reader: R,
        tx: mpsc::Sender<Inbound>,
        mut decoder: FrameDecoder,
        buffer_size: usize,
        state: Arc<StateCell>,
    ) {
        let mut buf = vec![0u8; buffer_size];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!("Serial channel reached EOF");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("Serial read error: {}", e);
                    break;
                }
            };

            for event in decoder.push(&buf[..n]) {
                let inbound = match event {
                    FrameEvent::FrameReady(frame) => Inbound::Frame(frame),
                    FrameEvent::Corrupt => {
                        tracing::warn!("Dropped corrupt frame");
                        Inbound::Corrupt
                    }
                    FrameEvent::Incomplete => continue,
                };
                if tx.send(inbound).await.is_err() {
                    return;
                }
            }
        }

        state.close();
        let _ = tx.send(Inbound::Closed).await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Whether the session can still carry requests.
    pub fn is_open(&self) -> bool {
        self.state() != SessionState::Closed
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Send one request and wait for its response.
    ///
    /// Never retries. Bounded by the configured request timeout (plus, after a cancelled
    /// request, the remainder of that request's deadline while its late response is drained).
    pub async fn request(
        &self,
        command: CommandCode,
        payload: &[u8],
    ) -> Result<Frame, TransportError> {
        let bytes = encode(command.code(), payload)?;
        let mut exchange = self.acquire().await?;

        if !self.is_open() {
            self.fail(&mut exchange);
            return Err(TransportError::ChannelClosed);
        }
        if let Err(e) = exchange.settle().await {
            self.fail(&mut exchange);
            return Err(e);
        }

        let _in_flight = InFlight::begin(&self.shared.state);
        let deadline = Instant::now() + self.shared.config.request_timeout();
        // Cleared only once the exchange resolves; a dropped future leaves both for `settle`.
        exchange.stale_until = Some(deadline);
        exchange.in_flight = Some(command.response_code());

        tracing::debug!("Sending {} ({} byte payload)", command, payload.len());
        if let Err(e) = exchange.write(&bytes).await {
            tracing::error!("Write failed for {}: {}", command, e);
            self.fail(&mut exchange);
            return Err(e);
        }

        let result = exchange
            .await_response(command, deadline, self.shared.config.correlation)
            .await;
        exchange.stale_until = None;
        exchange.in_flight = None;
        if matches!(&result, Err(e) if e.is_transient()) {
            exchange.abandoned = Some(command.response_code());
        }

        match &result {
            Err(TransportError::ChannelClosed) | Err(TransportError::UnexpectedCommand { .. }) => {
                if let Err(e) = &result {
                    tracing::error!("Closing session after {}: {}", command, e);
                }
                self.fail(&mut exchange);
            }
            Err(e) => tracing::debug!("{} failed: {}", command, e),
            Ok(_) => {}
        }

        result
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, Exchange>, TransportError> {
        match self.shared.config.busy_mode {
            BusyMode::Queue => Ok(self.shared.exchange.lock().await),
            BusyMode::Reject => self
                .shared
                .exchange
                .try_lock()
                .map_err(|_| TransportError::SessionBusy),
        }
    }

    /// Close after an unrecoverable error, while already holding the slot.
    fn fail(&self, exchange: &mut Exchange) {
        self.shared.state.close();
        self.shared.reader.abort();
        exchange.writer = None;
        self.release_lease();
    }

    fn release_lease(&self) {
        let mut lease = self
            .shared
            .lease
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        lease.take();
    }

    /// Close the channel.
    ///
    /// Pending and queued requests resolve with `ChannelClosed`. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), TransportError> {
        if !self.shared.state.close() {
            return Ok(());
        }
        self.shared.reader.abort();

        let mut exchange = self.shared.exchange.lock().await;
        let result = match exchange.writer.take() {
            Some(mut writer) => writer.shutdown().await.map_err(TransportError::from),
            None => Ok(()),
        };
        self.release_lease();
        tracing::debug!("Session closed");
        result
    }
}
