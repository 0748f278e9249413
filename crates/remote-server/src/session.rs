// crates/remote-server/src/session.rs

//! Per-connection task: handshake, read loop and writer.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use remote_protocol::wire::{EXIT_MARKER, EXIT_UNAUTHORIZED, OSD_REMOTE_CONNECTED};
use remote_protocol::Event;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::LossyLineCodec;
use crate::context::ServerContext;
use crate::dispatcher;
use crate::registry::SessionHandle;
use crate::types::{ClientId, ControlRequest, Outbound, OutboundRx, OutboundTx};

type LineReader = FramedRead<OwnedReadHalf, LossyLineCodec>;
type LineWriter = FramedWrite<OwnedWriteHalf, LinesCodec>;

/// Run a single connection from accept to close.
pub(crate) async fn run_session(
    client_id: ClientId,
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) {
    // Split stream
    let (read_stream, write_stream) = stream.into_split();
    let mut lines = FramedRead::new(read_stream, LossyLineCodec::new(ctx.config.max_line_length));

    // Writer task: the only place this socket is written from.
    let (out_tx, out_rx): (OutboundTx, OutboundRx) =
        mpsc::channel(ctx.config.max_queued_batches.max(1));
    let abort = ctx.force_close.child_token();
    let writer = tokio::spawn(run_writer(
        client_id,
        write_stream,
        out_rx,
        abort.clone(),
        ctx.clone(),
    ));

    let admitted = handshake(client_id, peer_addr, &mut lines, out_tx, abort, &ctx).await;
    if let Some(closed) = admitted {
        read_loop(client_id, lines, closed, &ctx).await;
        ctx.teardown(client_id, None).await;
    }

    // Wait until everything queued has been written.
    if let Err(e) = writer.await {
        warn!(client = %client_id, error = %e, "writer task failed");
    }
    debug!(client = %client_id, "session finished");
}

/// Read the peer's identity line and decide whether it may stay.
///
/// On success the session is registered and the returned receiver
/// fires when it is removed again. `None` means the connection ends
/// here; `out_tx` is dropped so the writer flushes and closes.
async fn handshake(
    client_id: ClientId,
    peer_addr: SocketAddr,
    lines: &mut LineReader,
    out_tx: OutboundTx,
    abort: CancellationToken,
    ctx: &ServerContext,
) -> Option<oneshot::Receiver<()>> {
    let closing = || vec![Event::Closing.to_line()];

    let next = tokio::select! {
        _ = ctx.shutdown.cancelled() => {
            let _ = out_tx.try_send(closing());
            return None;
        }
        next = lines.next() => next,
    };
    let identity = match next {
        Some(Ok(line)) => line,
        Some(Err(e)) => {
            debug!(client = %client_id, error = %e, "handshake read failed");
            return None;
        }
        None => {
            debug!(client = %client_id, "peer closed before handshake");
            return None;
        }
    };

    if ctx.config.require_auth && !ctx.auth.is_approved(&identity) {
        let _ = out_tx.try_send(vec![Event::AuthCode(identity.clone()).to_line()]);

        let approved = tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                let _ = out_tx.try_send(closing());
                return None;
            }
            approved = ask_approval(ctx, &identity) => approved,
        };
        if !approved {
            info!(client = %client_id, peer = %identity, %peer_addr, "remote connection rejected");
            let _ = out_tx.try_send(vec![Event::Exit(EXIT_UNAUTHORIZED.to_string()).to_line()]);
            return None;
        }
    }

    if ctx.shutdown.is_cancelled() {
        let _ = out_tx.try_send(closing());
        return None;
    }

    let _ = out_tx.try_send(vec![
        Event::Connected.to_line(),
        Event::ClientGuid(client_id.0).to_line(),
    ]);
    ctx.auth.approve(&identity);

    ctx.observer.session_added(client_id, &identity);
    let (closed_tx, closed_rx) = oneshot::channel();
    ctx.sessions
        .insert(SessionHandle::new(
            client_id,
            identity.clone(),
            peer_addr,
            out_tx,
            abort,
            closed_tx,
        ))
        .await;

    // Shutdown may have emptied the registry between the check above
    // and the insert.
    if ctx.shutdown.is_cancelled() {
        ctx.teardown(client_id, Some(Event::Closing)).await;
        return None;
    }

    info!(client = %client_id, peer = %identity, %peer_addr, "remote connection authorized");
    ctx.post(ControlRequest::ShowText(OSD_REMOTE_CONNECTED.to_string()));

    Some(closed_rx)
}

/// Run the approver off the async runtime; it may block on a human.
async fn ask_approval(ctx: &ServerContext, identity: &str) -> bool {
    let approver = ctx.approver.clone();
    let who = identity.to_string();
    match tokio::task::spawn_blocking(move || approver.approve(&who)).await {
        Ok(approved) => approved,
        Err(e) => {
            warn!(error = %e, "approver failed, denying");
            false
        }
    }
}

async fn read_loop(
    client_id: ClientId,
    mut lines: LineReader,
    mut closed: oneshot::Receiver<()>,
    ctx: &ServerContext,
) {
    loop {
        tokio::select! {
            _ = &mut closed => {
                debug!(client = %client_id, "session removed, stopping reader");
                break;
            }
            next = lines.next() => match next {
                Some(Ok(line)) => {
                    debug!(client = %client_id, line = %line, "received");
                    let is_exit = line == EXIT_MARKER;
                    dispatcher::dispatch(ctx, client_id, &line).await;
                    if is_exit {
                        break;
                    }
                }
                Some(Err(e)) => {
                    debug!(client = %client_id, error = %e, "read error");
                    break;
                }
                None => {
                    debug!(client = %client_id, "peer closed connection");
                    break;
                }
            }
        }
    }
}

async fn run_writer(
    client_id: ClientId,
    write_stream: OwnedWriteHalf,
    mut out_rx: OutboundRx,
    abort: CancellationToken,
    ctx: Arc<ServerContext>,
) {
    let mut sink = FramedWrite::new(write_stream, LinesCodec::new());

    let result = tokio::select! {
        biased;
        _ = abort.cancelled() => {
            debug!(client = %client_id, "writer aborted");
            return;
        }
        result = pump(&mut sink, &mut out_rx) => result,
    };

    if let Err(e) = result {
        debug!(client = %client_id, error = %e, "write failed, dropping session");
        ctx.teardown(client_id, None).await;
    }
}

/// Write batches until every sender is gone, then flush and send FIN.
async fn pump(sink: &mut LineWriter, out_rx: &mut OutboundRx) -> Result<(), LinesCodecError> {
    while let Some(batch) = out_rx.recv().await {
        write_batch(sink, batch).await?;
    }
    SinkExt::<String>::close(sink).await
}

async fn write_batch(sink: &mut LineWriter, batch: Outbound) -> Result<(), LinesCodecError> {
    for line in batch {
        sink.feed(line).await?;
    }
    SinkExt::<String>::flush(sink).await
}
