use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bridge::message::{BridgeError, BridgeMessage, BridgeResponse};
use crate::dom::document::Document;
use crate::filler::filler::{FillReport, fill_page};
use crate::mapper::mapping_model::{FieldMapping, retain_confident};
use crate::scanner::scan_model::ScanResult;
use crate::scanner::scanner::scan_page;

/// Page-side message handler. Owns the page; scanning and filling run to
/// completion inside [`PageBridge::handle`]. Fill requests pass through the
/// confidence filter before touching the page.
pub struct PageBridge {
    page: Document,
}

impl PageBridge {
    pub fn new(page: Document) -> Self {
        Self { page }
    }

    pub fn handle(&mut self, raw: &Value) -> BridgeResponse {
        let mut response = match BridgeMessage::decode(raw) {
            Ok(BridgeMessage::ScanPage) => BridgeResponse::scanned(scan_page(&mut self.page)),
            Ok(BridgeMessage::FillPage { mut payload }) => {
                let supplied = payload.mapping.len();
                retain_confident(&mut payload.mapping);
                if payload.mapping.len() < supplied {
                    warn!(
                        dropped = supplied - payload.mapping.len(),
                        "ignoring low-confidence mappings"
                    );
                }
                BridgeResponse::filled(fill_page(&mut self.page, &payload.mapping))
            }
            Err(e) => {
                warn!(error = %e, "rejecting bridge message");
                BridgeResponse::failure(&e)
            }
        };
        response.id = raw.get("id").cloned();
        response
    }

    pub fn page(&self) -> &Document {
        &self.page
    }

    pub fn into_page(self) -> Document {
        self.page
    }
}

struct Envelope {
    message: Value,
    reply: oneshot::Sender<BridgeResponse>,
}

/// Caller side of a spawned [`PageBridge`]. Replies arrive asynchronously.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Envelope>,
}

/// Move `page` into its own task and return a handle for messaging it. The
/// task ends, yielding the page, once every handle is dropped.
pub fn spawn_bridge(page: Document) -> (BridgeHandle, JoinHandle<Document>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(16);

    let task = tokio::spawn(async move {
        let mut bridge = PageBridge::new(page);
        while let Some(envelope) = rx.recv().await {
            let response = bridge.handle(&envelope.message);
            if envelope.reply.send(response).is_err() {
                debug!("bridge caller went away before the reply");
            }
        }
        bridge.into_page()
    });

    (BridgeHandle { tx }, task)
}

impl BridgeHandle {
    pub async fn send(&self, message: Value) -> Result<BridgeResponse, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)
    }

    pub async fn scan(&self) -> Result<ScanResult, BridgeError> {
        self.send(BridgeMessage::ScanPage.to_value())
            .await?
            .into_scan()
    }

    pub async fn fill(&self, mapping: Vec<FieldMapping>) -> Result<FillReport, BridgeError> {
        self.send(BridgeMessage::fill(mapping).to_value())
            .await?
            .into_fill()
    }
}
