// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket fan-out gateway.
//!
//! Clients connect, optionally send `{"subscribe": "<task_id>"}` (default
//! `"*"`), and receive `{v:1, kind, task_id, instant, attrs}` envelopes.
//! Delivery is best-effort: a client that lags its broadcast buffer or
//! stalls on the socket is disconnected, never awaited.

use crate::bus::Bus;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use sui_core::Notice;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

/// How long the gateway waits for an optional subscribe frame before
/// defaulting to the wildcard topic.
const SUBSCRIBE_WAIT: Duration = Duration::from_millis(500);

/// How long one envelope send may take before the client is dropped.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind and run the accept-loop until shutdown flips.
pub async fn run(addr: &str, bus: Bus, shutdown: tokio::sync::watch::Receiver<bool>) {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr, error = %e, "gateway bind failed");
            return;
        }
    };
    tracing::info!(addr, "gateway listening");
    run_on(listener, bus, shutdown).await;
}

/// Accept-loop over an already bound listener.
pub async fn run_on(listener: TcpListener, bus: Bus, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "gateway client connected");
                        let bus = bus.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, bus).await {
                                tracing::debug!(%peer, error = %e, "gateway client closed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "gateway accept failed");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("gateway stopping");
                    return;
                }
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    bus: Bus,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    // Optional first frame selects the topic.
    let filter = tokio::time::timeout(SUBSCRIBE_WAIT, source.next())
        .await
        .ok()
        .flatten()
        .and_then(|msg| msg.ok())
        .and_then(parse_subscribe)
        .unwrap_or_else(|| "*".to_string());

    let mut notices = if filter == "*" {
        bus.subscribe_all()
    } else {
        bus.subscribe_task(&filter)
    };
    tracing::debug!(filter, "gateway subscription active");

    loop {
        tokio::select! {
            received = notices.recv() => {
                match received {
                    Ok(notice) => forward(&mut sink, &notice).await?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Too slow; drop rather than block the bus.
                        tracing::warn!(filter, skipped, "client lagged, disconnecting");
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(());
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Re-subscription mid-stream is not supported.
                    }
                    Some(Err(e)) => return Err(e),
                }
            }
        }
    }
}

async fn forward<S>(
    sink: &mut S,
    notice: &Notice,
) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = notice.envelope().to_string();
    match tokio::time::timeout(SEND_TIMEOUT, sink.send(Message::text(text))).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("client send stalled, disconnecting");
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
        }
    }
}

fn parse_subscribe(msg: Message) -> Option<String> {
    let text = msg.into_text().ok()?;
    let value: Value = serde_json::from_str(text.as_str()).ok()?;
    value
        .get("subscribe")
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
