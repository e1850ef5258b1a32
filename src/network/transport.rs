//! WebSocket adapter for the event channel: one JSON text frame per event,
//! with transport-level reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as Frame;

use super::channel::{ChannelConnector, ChannelEvent, ChannelSink, EventChannel};
use super::protocol::{InboundEvent, OutboundEvent};
use crate::common::UserId;
use crate::error::{Result, SyncError};

pub struct WsConnector {
    url: String,
    reconnect_delay: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
        }
    }
}

impl ChannelConnector for WsConnector {
    fn connect(&self, identity: &UserId, sink: ChannelSink) -> Result<Box<dyn EventChannel>> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SyncError::Channel("no async runtime to drive the socket".to_string()));
        }
        log::info!("Connecting event channel for {identity} to {}", self.url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_socket(
            self.url.clone(),
            self.reconnect_delay,
            outbound_rx,
            sink,
            Arc::clone(&connected),
        ));
        Ok(Box::new(WsChannel {
            outbound: outbound_tx,
            connected,
            task,
        }))
    }
}

pub struct WsChannel {
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl EventChannel for WsChannel {
    /// Fails while disconnected: nothing is queued for later delivery.
    fn emit(&self, event: OutboundEvent) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(SyncError::Channel(format!("not connected; dropped `{}`", event.name())));
        }
        self.outbound
            .send(event)
            .map_err(|_| SyncError::Channel("socket task has stopped".to_string()))
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.task.abort();
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_socket(
    url: String,
    reconnect_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    sink: ChannelSink,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                log::info!("Event channel connected to {url}");
                let (mut write, mut read) = socket.split();
                connected.store(true, Ordering::Release);
                if !sink.deliver(ChannelEvent::Connected) {
                    return;
                }

                loop {
                    tokio::select! {
                        event = outbound.recv() => {
                            let Some(event) = event else {
                                let _ = write.send(Frame::Close(None)).await;
                                return;
                            };
                            match serde_json::to_string(&event) {
                                Ok(json) => {
                                    if let Err(err) = write.send(Frame::Text(json.into())).await {
                                        log::warn!("Event channel write failed: {err}");
                                        break;
                                    }
                                }
                                Err(err) => log::warn!("Failed to encode `{}`: {err}", event.name()),
                            }
                        }
                        frame = read.next() => {
                            match frame {
                                Some(Ok(Frame::Text(text))) => {
                                    match serde_json::from_str::<InboundEvent>(text.as_str()) {
                                        Ok(event) => {
                                            if !sink.deliver(ChannelEvent::Inbound(event)) {
                                                return;
                                            }
                                        }
                                        Err(err) => log::debug!("Ignoring unrecognized frame: {err}"),
                                    }
                                }
                                Some(Ok(Frame::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(err)) => {
                                    log::warn!("Event channel read failed: {err}");
                                    break;
                                }
                            }
                        }
                    }
                }

                connected.store(false, Ordering::Release);
                if !sink.deliver(ChannelEvent::Disconnected) {
                    return;
                }
            }
            Err(err) => log::warn!("Event channel connect to {url} failed: {err}"),
        }

        // Emissions accepted just before the drop are not replayed.
        while outbound.try_recv().is_ok() {}
        tokio::time::sleep(reconnect_delay).await;
        log::debug!("Reconnecting event channel to {url}");
    }
}
