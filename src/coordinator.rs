use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::bridge::handler::BridgeHandle;
use crate::bridge::message::BridgeError;
use crate::filler::filler::FillReport;
use crate::mapper::error::MapperError;
use crate::mapper::mapper::MappingService;
use crate::mapper::mapping_model::{FieldMapping, StudentData, retain_confident};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::{PipelineStage, TraceEvent};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("page bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

/// What one pipeline run saw and did. `report` is None for previews.
#[derive(Debug, Clone, Serialize)]
pub struct AutofillOutcome {
    pub scanned: usize,
    pub mappings: Vec<FieldMapping>,
    /// The page's controls changed between the scan and the fill.
    pub page_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<FillReport>,
}

/// Drives scan -> map -> fill through the page bridge.
pub struct Coordinator {
    bridge: BridgeHandle,
    mapper: Arc<dyn MappingService>,
    trace: Arc<TraceLogger>,
    step: AtomicU64,
}

impl Coordinator {
    pub fn new(bridge: BridgeHandle, mapper: Arc<dyn MappingService>, trace: Arc<TraceLogger>) -> Self {
        Self {
            bridge,
            mapper,
            trace,
            step: AtomicU64::new(0),
        }
    }

    /// Scan and map without touching the page.
    pub async fn preview(&self, student: &StudentData) -> Result<AutofillOutcome, PipelineError> {
        let (scanned, _, mappings) = self.scan_and_map(student).await?;
        Ok(AutofillOutcome {
            scanned,
            mappings,
            page_changed: false,
            report: None,
        })
    }

    pub async fn autofill(&self, student: &StudentData) -> Result<AutofillOutcome, PipelineError> {
        let (scanned, fingerprint, mappings) = self.scan_and_map(student).await?;

        let page_changed = self.page_changed_since(&fingerprint).await?;

        let step = self.next_step();
        let report = match self.bridge.fill(mappings.clone()).await {
            Ok(report) => report,
            Err(e) => {
                self.trace
                    .log(&TraceEvent::now(step, PipelineStage::Fill).with_error(&e));
                return Err(e.into());
            }
        };

        self.trace.log(
            &TraceEvent::now(step, PipelineStage::Fill)
                .with_mappings(report.total_count)
                .with_filled(report.filled_count)
                .with_selectors(report.errors.iter().map(|e| e.selector.as_str())),
        );
        info!(
            filled = report.filled_count,
            total = report.total_count,
            "autofill complete"
        );

        Ok(AutofillOutcome {
            scanned,
            mappings,
            page_changed,
            report: Some(report),
        })
    }

    async fn scan_and_map(
        &self,
        student: &StudentData,
    ) -> Result<(usize, String, Vec<FieldMapping>), PipelineError> {
        let step = self.next_step();
        let scan = match self.bridge.scan().await {
            Ok(scan) => scan,
            Err(e) => {
                self.trace
                    .log(&TraceEvent::now(step, PipelineStage::Scan).with_error(&e));
                return Err(e.into());
            }
        };
        self.trace.log(
            &TraceEvent::now(step, PipelineStage::Scan)
                .with_elements(scan.elements.len())
                .with_fingerprint(&scan.fingerprint),
        );

        let step = self.next_step();
        let mut mappings = match self.mapper.map_fields(&scan.elements, student).await {
            Ok(mappings) => mappings,
            Err(e) => {
                self.trace
                    .log(&TraceEvent::now(step, PipelineStage::Map).with_error(&e));
                return Err(e.into());
            }
        };

        // Every mapper already filters, but nothing below 0.8 may reach the page.
        let proposed = mappings.len();
        retain_confident(&mut mappings);
        if mappings.len() < proposed {
            warn!(dropped = proposed - mappings.len(), "mapper returned low-confidence entries");
        }

        self.trace.log(
            &TraceEvent::now(step, PipelineStage::Map)
                .with_elements(scan.elements.len())
                .with_mappings(mappings.len())
                .with_selectors(mappings.iter().map(|m| m.selector.as_str())),
        );

        Ok((scan.elements.len(), scan.fingerprint, mappings))
    }

    async fn page_changed_since(&self, fingerprint: &str) -> Result<bool, PipelineError> {
        let step = self.next_step();
        let rescan = self.bridge.scan().await?;
        let changed = rescan.fingerprint != fingerprint;

        let mut event = TraceEvent::now(step, PipelineStage::Verify)
            .with_elements(rescan.elements.len())
            .with_fingerprint(&rescan.fingerprint);
        if changed {
            warn!("page controls changed between scan and fill");
            event = event.with_note("fingerprint mismatch");
        }
        self.trace.log(&event);

        Ok(changed)
    }

    fn next_step(&self) -> u64 {
        self.step.fetch_add(1, Ordering::Relaxed)
    }
}
