//! Scripted fake firmware for integration tests.
//!
//! Runs on the far end of a `tokio::io::duplex` pipe, decodes each request frame with
//! the crate's own decoder, records it, and answers with whatever the script returns.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use neural_link::protocol::{encode, Frame, FrameDecoder, FrameEvent, PONG_CODE};
use neural_link::{NeuralUnit, Session, SessionConfig};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

/// What the fake firmware does with one request.
pub enum Reply {
    /// Answer with a well-formed frame.
    Respond(u8, Vec<u8>),
    /// Write these bytes as-is.
    Raw(Vec<u8>),
    /// Wait, then do the inner reply.
    After(Duration, Box<Reply>),
    /// Say nothing.
    Silent,
    /// Drop the connection.
    Hangup,
}

impl Reply {
    pub fn echo(request: &Frame, payload: &[u8]) -> Self {
        Reply::Respond(request.command(), payload.to_vec())
    }

    pub fn after(delay: Duration, reply: Reply) -> Self {
        Reply::After(delay, Box::new(reply))
    }
}

/// Observations from the firmware side of the pipe.
#[derive(Clone, Default)]
pub struct Firmware {
    requests: Arc<Mutex<Vec<Frame>>>,
    bytes_received: Arc<AtomicUsize>,
}

impl Firmware {
    pub fn requests(&self) -> Vec<Frame> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received.load(Ordering::SeqCst)
    }
}

/// A response frame that fails its checksum.
pub fn corrupt_frame(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = encode(command, payload).unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x5A;
    bytes
}

/// Firmware that answers every command with plausible data.
pub fn well_behaved(request: &Frame) -> Reply {
    match request.command() {
        0x30 => Reply::Respond(PONG_CODE, Vec::new()),
        0x02 => Reply::echo(request, &[1, 70, 2, 85, 3, 40]),
        0x11 => Reply::echo(request, &[0xC0, 0x00]),
        0x20 => {
            let mut payload = Vec::new();
            for (name, raw) in [("bold", 0x8000u16), ("playful", 0x999A)] {
                let mut field = [0u8; 16];
                field[..name.len()].copy_from_slice(name.as_bytes());
                payload.extend_from_slice(&field);
                payload.extend_from_slice(&raw.to_be_bytes());
            }
            Reply::echo(request, &payload)
        }
        _ => Reply::echo(request, &[]),
    }
}

/// Start a session whose far end runs `script`.
pub fn start<F>(config: SessionConfig, script: F) -> (Session, Firmware)
where
    F: FnMut(&Frame) -> Reply + Send + 'static,
{
    let (host, device) = duplex(4096);
    let firmware = Firmware::default();
    tokio::spawn(run(device, script, firmware.clone()));
    (Session::from_stream(host, config), firmware)
}

/// Same as [`start`], wrapped in a [`NeuralUnit`].
pub fn start_unit<F>(config: SessionConfig, script: F) -> (NeuralUnit, Firmware)
where
    F: FnMut(&Frame) -> Reply + Send + 'static,
{
    let (session, firmware) = start(config, script);
    (NeuralUnit::new(session), firmware)
}

pub fn config(timeout_ms: u64) -> SessionConfig {
    SessionConfig::new(Duration::from_millis(timeout_ms))
}

async fn run<F>(mut device: DuplexStream, mut script: F, firmware: Firmware)
where
    F: FnMut(&Frame) -> Reply + Send + 'static,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 512];

    loop {
        let n = match device.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        firmware.bytes_received.fetch_add(n, Ordering::SeqCst);

        for event in decoder.push(&buf[..n]) {
            let FrameEvent::FrameReady(frame) = event else {
                continue;
            };
            firmware.requests.lock().unwrap().push(frame.clone());
            let mut reply = script(&frame);

            loop {
                match reply {
                    Reply::After(delay, inner) => {
                        tokio::time::sleep(delay).await;
                        reply = *inner;
                    }
                    Reply::Respond(command, payload) => {
                        let bytes = encode(command, &payload).unwrap();
                        if device.write_all(&bytes).await.is_err() {
                            return;
                        }
                        break;
                    }
                    Reply::Raw(bytes) => {
                        if device.write_all(&bytes).await.is_err() {
                            return;
                        }
                        break;
                    }
                    Reply::Silent => break,
                    Reply::Hangup => return,
                }
            }
        }
    }
}
