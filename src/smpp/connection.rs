//! Connection Handler: owns one client socket end to end (the bind
//! state machine, command dispatch, and the single writer task that
//! serializes everything sent back to the client).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::BusPublisher;
use crate::pdu::codec::SmppCodec;
use crate::pdu::status::CommandStatus;
use crate::pdu::{BindRequest, BindResponse, Command, Pdu};
use crate::provider::Provider;
use crate::smpp::dispatcher::{generic_nack, Dispatcher};
use crate::smpp::session::{BindMode, ConnectionHandle, ConnectionId, SessionRegistry};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport closed")]
    TransportClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct ConnectionState {
    mode: BindMode,
    system_id: Option<String>,
    password: Option<String>,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            mode: BindMode::Unbound,
            system_id: None,
            password: None,
        }
    }
}

/// Drives one accepted socket (a worker's Unix-domain client stream, or a
/// bare TCP stream in single-worker test setups) until either its
/// transport closes or `shutdown` fires.
pub async fn handle_connection<S>(
    stream: S,
    peer: String,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
    provider: Arc<dyn Provider>,
    bus: Arc<BusPublisher>,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let framed = Framed::new(stream, SmppCodec::new());
    let (mut sink, mut stream) = framed.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let writer = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let seq = command.sequence_number;
            if let Err(e) = sink.send(command).await {
                if !e.is_encoding() {
                    warn!(peer = %peer, error = %e, "write failed, closing connection");
                    break;
                }
                warn!(peer = %peer, error = %e, "outbound PDU failed to encode, falling back to generic_nack");
                let fallback = generic_nack(seq, CommandStatus::UnknownError);
                if let Err(e) = sink.send(fallback).await {
                    if e.is_encoding() {
                        warn!(peer = %peer, error = %e, "generic_nack fallback also failed to encode, dropping it");
                        continue;
                    }
                    warn!(peer = %peer, error = %e, "write failed, closing connection");
                    break;
                }
            }
        }
    });

    let conn_id = ConnectionId::new();
    let mut state = ConnectionState::new();

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = stream.next() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let command = match frame {
            Ok(command) => command,
            Err(e) if e.is_malformed() => {
                debug!(error = %e, "malformed frame, replying with generic_nack");
                let _ = tx.send(generic_nack(0, CommandStatus::UnknownError));
                continue;
            }
            Err(_) => break,
        };

        handle_command(
            command,
            &tx,
            conn_id,
            &mut state,
            &registry,
            &dispatcher,
            provider.as_ref(),
            &bus,
        )
        .await;
    }

    registry.unbind(conn_id);
    drop(tx);
    let _ = writer.await;
}

#[allow(clippy::too_many_arguments)]
async fn handle_command(
    command: Command,
    tx: &mpsc::UnboundedSender<Command>,
    conn_id: ConnectionId,
    state: &mut ConnectionState,
    registry: &SessionRegistry,
    dispatcher: &Dispatcher,
    provider: &dyn Provider,
    bus: &BusPublisher,
) {
    let seq = command.sequence_number;

    match command.pdu {
        Pdu::EnquireLink => {
            let _ = tx.send(Command::new(0, seq, Pdu::EnquireLinkResp));
        }

        Pdu::BindReceiver(req) => bind(req, BindMode::Receiver, seq, tx, conn_id, state, registry, provider, Pdu::BindReceiverResp).await,
        Pdu::BindTransmitter(req) => bind(req, BindMode::Transmitter, seq, tx, conn_id, state, registry, provider, Pdu::BindTransmitterResp).await,
        Pdu::BindTransceiver(req) => bind(req, BindMode::Transceiver, seq, tx, conn_id, state, registry, provider, Pdu::BindTransceiverResp).await,

        Pdu::Unbind => {
            if state.mode != BindMode::Unbound {
                registry.unbind(conn_id);
                state.mode = BindMode::Unbound;
                state.system_id = None;
                state.password = None;
            }
            let _ = tx.send(Command::new(0, seq, Pdu::UnbindResp));
        }

        Pdu::SubmitSm(pdu) => {
            if !state.mode.can_transmit() {
                let _ = tx.send(generic_nack(seq, CommandStatus::InvalidBindStatus));
                return;
            }
            let system_id = state.system_id.clone().unwrap_or_default();
            let password = state.password.clone().unwrap_or_default();
            dispatcher
                .handle_submit_sm(tx, &system_id, &password, bus, seq, pdu)
                .await;
        }

        Pdu::Unsupported { .. } => {
            let _ = tx.send(generic_nack(seq, CommandStatus::UnknownError));
        }

        other => {
            warn!(command_id = other.command_id(), "unexpected client-originated PDU, replying generic_nack");
            let _ = tx.send(generic_nack(seq, CommandStatus::UnknownError));
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn bind(
    req: BindRequest,
    mode: BindMode,
    seq: u32,
    tx: &mpsc::UnboundedSender<Command>,
    conn_id: ConnectionId,
    state: &mut ConnectionState,
    registry: &SessionRegistry,
    provider: &dyn Provider,
    make_resp: impl FnOnce(BindResponse) -> Pdu,
) {
    let authenticated = AssertUnwindSafe(provider.authenticate(&req.system_id, &req.password))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            warn!(system_id = %req.system_id, "provider panicked during authenticate, treating as auth failure");
            false
        });

    if authenticated {
        let handle = ConnectionHandle::new(conn_id, mode, tx.clone());
        registry.bind(&req.system_id, handle);
        state.mode = mode;
        state.system_id = Some(req.system_id.clone());
        state.password = Some(req.password.clone());
        info!(system_id = %req.system_id, mode = ?mode, "bound");
        let _ = tx.send(Command::new(
            0,
            seq,
            make_resp(BindResponse {
                system_id: req.system_id,
            }),
        ));
    } else {
        let _ = tx.send(Command::new(
            u32::from(CommandStatus::InvalidPassword),
            seq,
            make_resp(BindResponse {
                system_id: req.system_id,
            }),
        ));
    }
}
