use std::collections::HashSet;

use tracing::{debug, warn};

use chainlink_store::{EntityRow, EntityTx, TableSchema};
use chainlink_types::EntityId;

use crate::error::{GraphError, GraphResult, IntegrityError};

/// Outcome of walking a merge chain.
pub(crate) struct Resolution {
    /// The canonical row, or `None` when the chain dangles.
    pub canonical: Option<EntityRow>,
    /// Ids visited, starting row first.
    pub path: Vec<EntityId>,
}

/// Follow `merge_target_id` from `start` until a canonical row is reached.
///
/// A revisited id fails with [`IntegrityError::Cycle`]; more than `max_hops`
/// hops fails with [`IntegrityError::HopLimit`]. A pointer to a missing row
/// is reported and yields `canonical: None`.
pub(crate) fn resolve_row(
    tx: &dyn EntityTx,
    schema: &TableSchema,
    start: EntityRow,
    max_hops: usize,
) -> GraphResult<Resolution> {
    let start_id = start.id;
    let mut path = vec![start_id];
    let mut visited = HashSet::from([start_id]);
    let mut current = start;

    while let Some(target) = current.merge_target_id {
        if path.len() > max_hops {
            return Err(corrupt(IntegrityError::HopLimit {
                table: schema.table.clone(),
                start: start_id,
                limit: max_hops,
            }));
        }
        if !visited.insert(target) {
            return Err(corrupt(IntegrityError::Cycle {
                table: schema.table.clone(),
                start: start_id,
                revisited: target,
            }));
        }

        match tx.fetch(schema, target)? {
            Some(next) => {
                path.push(next.id);
                current = next;
            }
            None => {
                let dangling = IntegrityError::DanglingReference {
                    table: schema.table.clone(),
                    id: current.id,
                    target,
                };
                warn!(error = %dangling, start = %start_id, "merge target resolution failed");
                return Ok(Resolution {
                    canonical: None,
                    path,
                });
            }
        }
    }

    debug!(table = %schema.table, start = %start_id, hops = path.len() - 1, "resolved merge target");
    Ok(Resolution {
        canonical: Some(current),
        path,
    })
}

fn corrupt(error: IntegrityError) -> GraphError {
    warn!(error = %error, "merge chain is corrupt");
    error.into()
}
