//! Message Gateway: parse inbound envelopes, dispatch, emit responses.

use crate::protocol::{error_codes, ErrorInfo, Request, ResponseEnvelope};
use facebridge_core::{
    CapabilityLoader, FaceDetections, FaceError, FaceMatcher, ImageArg, ImageRef, ModelGate,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("host channel closed")]
    Closed,
    #[error("host channel write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Host-provided primitive for posting a frame back to the host.
pub trait Outbound: Send + Sync {
    fn post(&self, frame: &str) -> Result<(), TransportError>;
}

pub struct Gateway<L: CapabilityLoader> {
    gate: Arc<ModelGate<L>>,
    matcher: FaceMatcher<L>,
    detections: FaceDetections<L>,
    outbound: Option<Arc<dyn Outbound>>,
}

impl<L: CapabilityLoader> Gateway<L> {
    /// A gateway without `outbound` still processes requests but emits nothing.
    pub fn new(gate: Arc<ModelGate<L>>, outbound: Option<Arc<dyn Outbound>>) -> Self {
        Self {
            matcher: FaceMatcher::new(Arc::clone(&gate)),
            detections: FaceDetections::new(Arc::clone(&gate)),
            gate,
            outbound,
        }
    }

    pub fn parse(raw: &str) -> Result<Request, GatewayError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serve inbound frames one at a time until the sender side closes.
    pub async fn run(&self, mut inbound: mpsc::Receiver<String>) {
        tracing::info!("gateway listening");
        while let Some(raw) = inbound.recv().await {
            self.on_message(&raw).await;
        }
        tracing::info!("gateway inbound closed");
    }

    pub async fn on_message(&self, raw: &str) {
        if let Some(response) = self.handle(raw).await {
            self.emit(&response);
        }
    }

    /// Parse and dispatch one frame. Malformed frames yield no response.
    pub async fn handle(&self, raw: &str) -> Option<ResponseEnvelope> {
        match Self::parse(raw) {
            Ok(request) => Some(self.dispatch(request).await),
            Err(err) => {
                tracing::warn!(error = %err, len = raw.len(), "dropping inbound frame");
                None
            }
        }
    }

    /// Run a request to completion and wrap the outcome in an envelope.
    ///
    /// The work runs in its own task so a panic inside a component still
    /// produces exactly one (error) response.
    pub async fn dispatch(&self, request: Request) -> ResponseEnvelope {
        let kind = request.kind();
        let matcher = self.matcher.clone();
        let detections = self.detections.clone();

        let task = tokio::spawn(async move {
            match request {
                Request::MatchFace {
                    query_image,
                    training_images,
                } => {
                    tracing::info!(training = training_images.len(), "MATCH_FACE received");
                    let confidence = matcher.match_faces(&query_image, &training_images).await?;
                    Ok::<_, FaceError>(serde_json::json!(confidence))
                }
                Request::DetectFace { query_image } => {
                    tracing::info!(
                        batch = matches!(query_image, ImageArg::Batch(_)),
                        "DETECT_FACE received"
                    );
                    let output = detections.get_detections(&query_image).await?;
                    Ok(serde_json::to_value(output).unwrap_or(serde_json::Value::Null))
                }
            }
        });

        match task.await {
            Ok(Ok(result)) => ResponseEnvelope::success(kind, result),
            Ok(Err(err)) => {
                tracing::warn!(?kind, error = %err, "request failed");
                ResponseEnvelope::failure(kind, ErrorInfo::from(&err))
            }
            Err(join_err) => {
                tracing::error!(?kind, error = %join_err, "request task aborted");
                ResponseEnvelope::failure(
                    kind,
                    ErrorInfo::new(error_codes::INTERNAL, "request processing aborted"),
                )
            }
        }
    }

    /// Serialize and post `envelope`. Never fails: a missing or broken
    /// channel just drops the frame.
    pub fn emit(&self, envelope: &ResponseEnvelope) {
        let Some(outbound) = &self.outbound else {
            tracing::debug!(kind = ?envelope.kind, "no host channel, response dropped");
            return;
        };
        let frame = match serde_json::to_string(envelope) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "response serialization failed");
                return;
            }
        };
        if let Err(err) = outbound.post(&frame) {
            tracing::debug!(error = %err, "host channel unavailable, response dropped");
        }
    }

    /// Tell the host that models are loaded.
    pub fn announce_ready(&self) {
        self.emit(&ResponseEnvelope::model_loaded());
    }

    /// Load models ahead of the first request, optionally run one warm-up
    /// detection, then announce readiness.
    pub async fn preload(&self, warmup_image: Option<&ImageRef>) -> Result<(), FaceError> {
        self.gate.ready().await?;
        if let Some(image) = warmup_image {
            let output = self
                .detections
                .get_detections(&ImageArg::Single(image.clone()))
                .await?;
            tracing::info!(found = !output.is_empty(), "warm-up detection finished");
        }
        self.announce_ready();
        Ok(())
    }
}
