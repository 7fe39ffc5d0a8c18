//! Run numbering.
//!
//! A run is one pass over the requested locations. Its number is one more
//! than the largest `run_no` persisted anywhere in the store, so numbering
//! survives restarts without a separate counter.

use log::warn;
use serde_json::Value;

use crate::store::SampleStore;

/// The store already holds the largest run number a sample can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("run numbers exhausted: the store already holds run {highest}")]
pub struct RunsExhausted {
    pub highest: u64,
}

/// `1 + max(run_no)` across every location, or `1` for an empty or
/// unreadable store. Entries without a positive integer `run_no` are ignored.
///
/// Fails instead of wrapping or reusing a number when the highest stored run
/// has no successor that fits in a `u32`.
pub fn next_run_number(store: &dyn SampleStore) -> Result<u32, RunsExhausted> {
    let records = match store.scan() {
        Ok(records) => records,
        Err(e) => {
            warn!("could not scan store for run numbers, starting at 1: {e}");
            return Ok(1);
        }
    };

    let highest = records
        .iter()
        .flat_map(|r| r.entries.iter())
        .filter_map(entry_run_no)
        .max()
        .unwrap_or(0);
    highest
        .checked_add(1)
        .and_then(|next| u32::try_from(next).ok())
        .ok_or(RunsExhausted { highest })
}

fn entry_run_no(entry: &Value) -> Option<u64> {
    entry.get("run_no")?.as_u64().filter(|&n| n > 0)
}
