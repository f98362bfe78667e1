//! Snapshot history maintenance

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Observation;
use crate::storage::{Snapshot, Transaction};
use crate::Result;

/// What [record] staged for one light
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    /// The light was never seen before
    pub new_light: bool,

    /// A metadata record was appended
    pub metadata: bool,

    /// A state record was appended
    pub state: bool,
}

/// Stage identity, metadata and state for a light seen for the first time
///
/// # Returns
///   the new row id
///
pub fn track_new(tx: &mut Transaction, light: &Observation, now: DateTime<Utc>) -> Result<Uuid> {
    let row_id = tx.insert_identity(light.identity.clone());
    tx.insert_metadata(row_id, now, light.metadata.clone())?;
    tx.insert_state(row_id, now, light.state.clone())?;
    Ok(row_id)
}

/// Stage whatever changed about `light` since its last snapshot
///
/// Metadata (name, firmware) and state are compared independently and
/// only the side that differs gets a new record. A light without a
/// snapshot is tracked from scratch.
pub fn record(
    tx: &mut Transaction,
    previous: Option<&Snapshot>,
    light: &Observation,
    now: DateTime<Utc>,
) -> Result<Recorded> {
    let previous = match previous {
        Some(previous) => previous,
        None => {
            track_new(tx, light, now)?;
            return Ok(Recorded {
                new_light: true,
                metadata: true,
                state: true,
            });
        }
    };

    let mut recorded = Recorded::default();

    if !previous.metadata.metadata.same_details(&light.metadata) {
        tx.insert_metadata(previous.row_id, now, light.metadata.clone())?;
        recorded.metadata = true;
    }

    if previous.state.state != light.state {
        tx.insert_state(previous.row_id, now, light.state.clone())?;
        recorded.state = true;
    }

    Ok(recorded)
}
