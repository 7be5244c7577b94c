//! ============================================================================
//! Correlation Cell - Write-Once Call Id Register
//! ============================================================================
//! The call id arrives from two independent sources (the call client's
//! `call-start` event and the realtime `call-created` broadcast). The first
//! one to arrive owns the session id; later writers are ignored.
//!
//! The check-and-set is a single `OnceLock::set`, so the rule holds no
//! matter how many tasks race to adopt an id. Only the owner (`&mut`) can
//! clear the cell.
//! ============================================================================

use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::types::{CallId, IdSource};

/// Outcome of an adoption attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adoption {
    /// The cell was empty and now holds this id
    Adopted(CallId),
    /// The cell already held the same id
    Duplicate,
    /// The cell already held a different id, which is kept
    Conflict { kept: CallId, rejected: CallId },
}

#[derive(Debug)]
struct Entry {
    id: CallId,
    source: IdSource,
}

/// Single-assignment register for the session's call id
#[derive(Debug, Default)]
pub struct CorrelationCell {
    slot: OnceLock<Entry>,
}

impl CorrelationCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt `id` if no id is set yet (first writer wins)
    pub fn adopt(&self, id: CallId, source: IdSource) -> Adoption {
        let candidate = Entry {
            id: id.clone(),
            source,
        };

        match self.slot.set(candidate) {
            Ok(()) => {
                info!("Adopted call id {} via {:?}", id, source);
                Adoption::Adopted(id)
            }
            Err(_) => {
                // `set` failed, so the slot is populated
                let Some(current) = self.slot.get() else {
                    return Adoption::Duplicate;
                };
                if current.id == id {
                    debug!("Call id {} confirmed again via {:?}", id, source);
                    Adoption::Duplicate
                } else {
                    warn!(
                        "Ignoring call id {} from {:?}: session already owns {} (via {:?})",
                        id, source, current.id, current.source
                    );
                    Adoption::Conflict {
                        kept: current.id.clone(),
                        rejected: id,
                    }
                }
            }
        }
    }

    pub fn get(&self) -> Option<&CallId> {
        self.slot.get().map(|e| &e.id)
    }

    /// Source that delivered the current id
    pub fn source(&self) -> Option<IdSource> {
        self.slot.get().map(|e| e.source)
    }

    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Clear the cell for the next session, returning the previous id
    pub fn clear(&mut self) -> Option<CallId> {
        self.slot.take().map(|e| e.id)
    }
}
