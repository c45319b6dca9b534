// =============================================================================
// Matrixon Timeline - Metrics Module
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Counters for the timeline store. Chunk graph corruption is reported
//   here instead of being raised, so repair and alerting tooling can watch
//   it without the insertion pipeline ever failing on it.
//
// =============================================================================

use ::metrics::{counter, describe_counter};
use matrixon_common::TimelineConfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::{
    service::rooms::{chunks::LinkDirection, event::PaginationDirection},
    Error, Result,
};

pub const TIMELINE_EVENTS_INSERTED: &str = "matrixon_timeline_events_inserted_total";
pub const TIMELINE_DUPLICATES_SKIPPED: &str = "matrixon_timeline_duplicates_skipped_total";
pub const READ_RECEIPTS_MOVED: &str = "matrixon_timeline_read_receipts_moved_total";
pub const CHUNK_GRAPH_CYCLES: &str = "matrixon_timeline_chunk_graph_cycles_total";

/// Installs the global Prometheus recorder when metrics are enabled.
///
/// The returned handle renders the scrape payload; serving it is up to the
/// embedding application.
pub fn install_prometheus_recorder(config: &TimelineConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enable_metrics {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Internal(format!("Failed to install metrics recorder: {e}")))?;
    describe_metrics();

    info!("📊 Timeline metrics recorder installed");
    Ok(Some(handle))
}

fn describe_metrics() {
    describe_counter!(TIMELINE_EVENTS_INSERTED, "Timeline entries created, by pagination direction");
    describe_counter!(TIMELINE_DUPLICATES_SKIPPED, "Insertions skipped because the chunk already held the event");
    describe_counter!(READ_RECEIPTS_MOVED, "Read receipts repointed to a newer event");
    describe_counter!(CHUNK_GRAPH_CYCLES, "Loops found while walking chunk links");
}

pub(crate) fn record_event_inserted(direction: PaginationDirection) {
    counter!(TIMELINE_EVENTS_INSERTED, "direction" => direction.as_str()).increment(1);
}

pub(crate) fn record_duplicate_skipped() {
    counter!(TIMELINE_DUPLICATES_SKIPPED).increment(1);
}

pub(crate) fn record_read_receipt_moved() {
    counter!(READ_RECEIPTS_MOVED).increment(1);
}

pub(crate) fn record_chunk_graph_cycle(direction: LinkDirection) {
    counter!(CHUNK_GRAPH_CYCLES, "direction" => direction.as_str()).increment(1);
}
