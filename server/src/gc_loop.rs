use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// Runs `AutoGC` on a fixed interval for the lifetime of the process
/// (spec §4.10: "scheduled via a `tokio::time::interval` loop in the
/// `server` binary"). Never returns.
pub async fn run(state: Arc<AppState>, interval_hours: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours.max(1) * 3600));
    // The first tick fires immediately; skip it so GC doesn't race startup.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let report = state.run_gc().await;
        for collection in &report.per_collection {
            if let Some(err) = &collection.error {
                tracing::error!(collection_id = %collection.collection_id, error = %err, "scheduled gc sweep failed");
            } else if collection.orphaned_vectors_deleted > 0 || collection.orphaned_metadata_deleted > 0 || collection.soft_deleted_purged > 0 {
                tracing::info!(
                    collection_id = %collection.collection_id,
                    orphaned_vectors_deleted = collection.orphaned_vectors_deleted,
                    orphaned_metadata_deleted = collection.orphaned_metadata_deleted,
                    soft_deleted_purged = collection.soft_deleted_purged,
                    "scheduled gc sweep reconciled divergence"
                );
            }
        }
    }
}
