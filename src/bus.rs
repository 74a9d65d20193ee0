//! Receipt Bus: cross-worker publish/subscribe so a receiver bound to
//! worker B sees a receipt synthesized from a submission on worker A.
//!
//! Transport is a thin length-prefixed TCP framing built the same way as
//! the PDU codec (a `tokio_util::codec::{Decoder, Encoder}` pair over
//! `BytesMut`), since no pub/sub crate appears anywhere in the retrieved
//! example pack.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pdu::codec::SmppCodec;
use crate::pdu::types::MAX_SYSTEM_ID;
use crate::pdu::{types, Command, CodecError};
use crate::smpp::session::SessionRegistry;

/// A receipt in transit on the bus: which `system_id` it's for, and the
/// `deliver_sm` command carrying it (sequence number is reassigned by
/// each subscriber per local connection, so the one on the wire here is
/// a placeholder).
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub system_id: String,
    pub receipt: Command,
}

#[derive(Debug, Default)]
pub struct BusCodec;

impl Decoder for BusCodec {
    type Item = BusMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BusMessage>, CodecError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        let mut frame = src.split_to(len);
        let system_id = types::read_coctet_string(&mut frame)?;
        let receipt = SmppCodec::new()
            .decode(&mut frame)?
            .ok_or_else(|| CodecError::malformed("bus frame did not contain a full PDU"))?;
        Ok(Some(BusMessage { system_id, receipt }))
    }
}

impl Encoder<BusMessage> for BusCodec {
    type Error = CodecError;

    fn encode(&mut self, item: BusMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
        let mut body = BytesMut::new();
        types::write_coctet_string(&mut body, "system_id", &item.system_id, MAX_SYSTEM_ID)?;
        SmppCodec::new().encode(item.receipt, &mut body)?;
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

/// One worker's publisher endpoint: a `TcpListener` that fans every
/// published message out to every currently-connected subscriber.
pub struct BusPublisher {
    tx: broadcast::Sender<BusMessage>,
}

impl BusPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn publish(&self, message: BusMessage) {
        // No subscribers yet (e.g. during startup) is not an error.
        let _ = self.tx.send(message);
    }

    /// Accepts subscriber connections until `shutdown` fires, then returns
    /// without waiting on the forwarding tasks it spawned (the worker's
    /// shutdown sequence drops this publisher's listener and moves on).
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let mut rx = self.tx.subscribe();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            let mut framed = Framed::new(stream, BusCodec);
                            loop {
                                tokio::select! {
                                    _ = shutdown.cancelled() => break,
                                    received = rx.recv() => match received {
                                        Ok(message) => {
                                            if framed.send(message).await.is_err() {
                                                break;
                                            }
                                        }
                                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                            warn!(skipped, %addr, "bus subscriber lagged, dropping messages");
                                        }
                                        Err(broadcast::error::RecvError::Closed) => break,
                                    },
                                }
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "bus publisher accept failed"),
                },
            }
        }
    }
}

impl Default for BusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Connects to one publisher address and forwards what it decodes to
/// local receivers, reconnecting with a fixed backoff on disconnect.
/// Returns once `shutdown` fires.
pub async fn run_subscriber(addr: String, registry: Arc<SessionRegistry>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            connected = TcpStream::connect(&addr) => match connected {
                Ok(stream) => {
                    debug!(%addr, "bus subscriber connected");
                    let mut framed = Framed::new(stream, BusCodec);
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            item = framed.next() => match item {
                                Some(Ok(message)) => deliver_locally(&registry, message),
                                Some(Err(e)) => {
                                    warn!(%addr, error = %e, "bus subscriber decode error");
                                    break;
                                }
                                None => break,
                            },
                        }
                    }
                }
                Err(e) => warn!(%addr, error = %e, "bus subscriber connect failed"),
            },
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
}

fn deliver_locally(registry: &SessionRegistry, message: BusMessage) {
    let receivers = registry.receivers_for(&message.system_id);
    if receivers.is_empty() {
        return;
    }
    for conn in receivers {
        let mut command = message.receipt.clone();
        command.sequence_number = conn.next_seq();
        conn.send(command);
    }
}
