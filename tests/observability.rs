// =============================================================================
// Matrixon Timeline - Observability Integration Tests
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Installs the global tracing subscriber and Prometheus recorder the way
//   an embedding client does, then checks the timeline counters come out.
//   Kept in its own binary since both installs are process-wide.
//
// =============================================================================

mod common;

use common::{room, sync_message};
use matrixon_timeline::{
    common::{init_tracing, LogFormat, TimelineConfig},
    metrics,
    ruma::user_id,
    service::rooms::{chunks, timeline},
    KeyValueDatabase, PaginationDirection,
};

#[test]
fn test_counters_reach_prometheus() {
    let config = TimelineConfig {
        log: "debug".to_owned(),
        log_format: LogFormat::Compact,
        enable_metrics: true,
    };
    init_tracing(&config).expect("subscriber installed");
    let handle = metrics::install_prometheus_recorder(&config)
        .expect("recorder installed")
        .expect("metrics enabled");

    let db = KeyValueDatabase::new();
    let alice = user_id!("@alice:matrixon.local");
    let event = sync_message("$counted:matrixon.local", alice, 100);
    db.transaction(|txn| {
        let chunk = chunks::create_chunk(txn, room(), None, None)?;
        timeline::insert_timeline_event(txn, &chunk, room(), &event, PaginationDirection::Forwards, false, None)?;
        timeline::insert_timeline_event(txn, &chunk, room(), &event, PaginationDirection::Forwards, false, None)?;
        Ok(())
    })
    .expect("batch committed");

    let rendered = handle.render();
    assert!(rendered.contains(metrics::TIMELINE_EVENTS_INSERTED));
    assert!(rendered.contains(metrics::TIMELINE_DUPLICATES_SKIPPED));
    assert!(rendered.contains(metrics::READ_RECEIPTS_MOVED));
    assert!(init_tracing(&config).is_err());
}
