//! Per-connection viewer session.
//!
//! Each websocket connection owns one [`ViewerSession`]: the loaded image,
//! the shared region service, and nothing else. There is no process-wide
//! viewer state. Inbound frames are parsed into typed events and dispatched
//! here; outbound frames are handed to the socket writer through a bounded
//! queue so compression work never blocks on socket I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::wire::{
    encode_frame, EventEnvelope, FileLoadAck, FileLoadRequest, RegionReadAck, RegionReadRequest,
};
use crate::error::RegionError;
use crate::image::ImageCatalog;
use crate::tile::{OpenImage, RegionService};

/// Maximum region frames queued for a slow socket before backpressure.
pub const OUTBOUND_QUEUE_DEPTH: usize = 32;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A message ready to go out on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON control message.
    Text(String),
    /// Hybrid binary region frame.
    Binary(Bytes),
}

/// One viewer's state: the image it has loaded and the service it reads
/// regions through.
pub struct ViewerSession {
    id: u64,
    service: Arc<RegionService>,
    catalog: Arc<dyn ImageCatalog>,
    image: Option<OpenImage>,
    filename: Option<String>,
}

impl ViewerSession {
    pub fn new(service: Arc<RegionService>, catalog: Arc<dyn ImageCatalog>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            service,
            catalog,
            image: None,
            filename: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Dispatch one inbound text frame. Every recognized event produces
    /// exactly one reply; unrecognized or malformed frames produce none.
    pub async fn handle_text(&mut self, text: &str) -> Option<Outbound> {
        let envelope: EventEnvelope<serde_json::Value> = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                warn!(session = self.id, error = %e, "discarding malformed frame");
                return None;
            }
        };

        match envelope.event.as_str() {
            "fileload" => {
                let request: FileLoadRequest = match serde_json::from_value(envelope.message) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(session = self.id, error = %e, "bad fileload message");
                        return Some(fileload_failure());
                    }
                };
                Some(self.handle_fileload(request).await)
            }
            "region_read" => {
                let request: RegionReadRequest = match serde_json::from_value(envelope.message) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(session = self.id, error = %e, "bad region_read message");
                        return Some(region_failure(&RegionReadRequest::default()));
                    }
                };
                Some(self.handle_region_read(request).await)
            }
            other => {
                debug!(session = self.id, event = other, "ignoring unknown event");
                None
            }
        }
    }

    async fn handle_fileload(&mut self, request: FileLoadRequest) -> Outbound {
        match self.catalog.open(&request.filename).await {
            Ok(source) => {
                let (width, height) = source.dimensions();
                let num_bands = source.num_bands();
                info!(
                    session = self.id,
                    filename = %request.filename,
                    width,
                    height,
                    num_bands,
                    "image loaded"
                );
                // Dropping the previous handle releases its cache and pool
                self.image = Some(self.service.open(source));
                self.filename = Some(request.filename);
                text_reply(
                    "fileload",
                    &FileLoadAck {
                        success: true,
                        num_bands,
                        width: Some(width),
                        height: Some(height),
                    },
                )
            }
            Err(e) => {
                warn!(session = self.id, filename = %request.filename, error = %e, "fileload failed");
                fileload_failure()
            }
        }
    }

    async fn handle_region_read(&mut self, request: RegionReadRequest) -> Outbound {
        let result = match &self.image {
            Some(image) => self.service.read_region(image, &request).await,
            None => Err(RegionError::NoImageLoaded),
        };

        match result {
            Ok(frame) => {
                debug!(
                    session = self.id,
                    x = frame.ack.x,
                    y = frame.ack.y,
                    w = frame.ack.w,
                    h = frame.ack.h,
                    mip = frame.ack.mip,
                    compression = frame.ack.compression,
                    "region served"
                );
                match encode_frame(&frame) {
                    Ok(bytes) => Outbound::Binary(bytes),
                    Err(e) => {
                        warn!(session = self.id, error = %e, "frame encoding failed");
                        region_failure(&request)
                    }
                }
            }
            Err(e) => {
                match &e {
                    RegionError::InvalidRegion { .. } | RegionError::Source(_) => {
                        warn!(session = self.id, error = %e, "region_read rejected")
                    }
                    _ => warn!(session = self.id, error = %e, "region_read failed"),
                }
                region_failure(&request)
            }
        }
    }
}

fn text_reply<T: serde::Serialize>(event: &str, message: &T) -> Outbound {
    let envelope = EventEnvelope {
        event: event.to_string(),
        message,
    };
    // Serialization of our own ack types cannot fail
    Outbound::Text(serde_json::to_string(&envelope).unwrap_or_default())
}

fn fileload_failure() -> Outbound {
    text_reply(
        "fileload",
        &FileLoadAck {
            success: false,
            num_bands: 0,
            width: None,
            height: None,
        },
    )
}

fn region_failure(request: &RegionReadRequest) -> Outbound {
    text_reply(
        "region_read",
        &RegionReadAck {
            success: false,
            x: request.x,
            y: request.y,
            w: 0,
            h: 0,
            mip: request.mip,
            band: request.band,
            compression: request.compression,
            hist: None,
        },
    )
}

/// Drive one websocket until it closes.
///
/// The socket splits into a reader half, dispatched through the session, and
/// a writer task fed by a bounded channel.
pub async fn run_session(
    socket: WebSocket,
    service: Arc<RegionService>,
    catalog: Arc<dyn ImageCatalog>,
) {
    let mut session = ViewerSession::new(service, catalog);
    let session_id = session.id();
    info!(session = session_id, "viewer connected");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_DEPTH);

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let message = match outbound {
                Outbound::Text(s) => Message::Text(s.into()),
                Outbound::Binary(b) => Message::Binary(b),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(m) => m,
            Err(e) => {
                debug!(session = session_id, error = %e, "socket error");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                if let Some(reply) = session.handle_text(text.as_str()).await {
                    if tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            // Binary uploads and pings: nothing to do, axum answers pings
            _ => {}
        }
    }

    drop(tx);
    let _ = writer.await;
    info!(session = session_id, "viewer disconnected");
}
