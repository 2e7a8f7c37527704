//! Comparison-protocol guards: backend execution order and device identity
//! pinning. Both run before any measurement so a mis-set-up A/B run fails
//! fast instead of producing records that cannot be compared.

use std::collections::BTreeMap;
use std::io;

use crate::config::{OrderMode, ProtocolConfig};
use crate::error::HarnessError;

/// Minimal key-value persistence for identity pins.
///
/// The store outlives the process (a file, a service); the harness only
/// needs get and write-once set.
pub trait KvStore {
    fn get(&mut self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

/// In-process store for embedders and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&mut self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The four-slot sequence for a fixed order mode, or None when the mode
/// leaves ordering free.
fn order_sequence<'a>(mode: OrderMode, a: &'a str, b: &'a str) -> Option<[&'a str; 4]> {
    match mode {
        OrderMode::FixedAbba => Some([a, b, b, a]),
        OrderMode::FixedBaab => Some([b, a, a, b]),
        OrderMode::Unconstrained | OrderMode::ExternallyAssigned => None,
    }
}

/// Check the active backend against the configured execution order.
///
/// `order_index` is 1-based; indices outside the four-slot sequence are
/// order violations, not configuration errors, because the index is what the
/// operator hand-assigns per run.
pub fn enforce_order(protocol: &ProtocolConfig, active_backend: &str) -> Result<(), HarnessError> {
    match protocol.order_mode {
        OrderMode::Unconstrained => Ok(()),
        OrderMode::FixedAbba | OrderMode::FixedBaab => {
            let seq = order_sequence(
                protocol.order_mode,
                protocol.backend_a.as_str(),
                protocol.backend_b.as_str(),
            )
            .unwrap_or([""; 4]);

            let idx = protocol.order_index;
            if idx == 0 || idx as usize > seq.len() {
                return Err(HarnessError::order_violation(format!(
                    "order_index {} outside 1..={}",
                    idx,
                    seq.len()
                )));
            }

            let expected = seq[idx as usize - 1];
            if active_backend == expected {
                Ok(())
            } else {
                Err(HarnessError::order_violation(format!(
                    "position {} expects backend '{}', got '{}'",
                    idx, expected, active_backend
                )))
            }
        }
        OrderMode::ExternallyAssigned => match protocol.assigned_backend.as_deref() {
            None => Err(HarnessError::order_violation(
                "externally-assigned mode with no assigned backend",
            )),
            Some(assigned) if assigned == active_backend => Ok(()),
            Some(assigned) => Err(HarnessError::order_violation(format!(
                "assigned backend '{}', got '{}'",
                assigned, active_backend
            ))),
        },
    }
}

/// Pin or verify the device fingerprint for a comparison group.
///
/// First run writes the pin; later runs must observe the same fingerprint or
/// their records would silently mix devices.
pub fn enforce_identity(
    store: &mut dyn KvStore,
    group: &str,
    fingerprint: &str,
) -> Result<(), HarnessError> {
    match store.get(group).map_err(HarnessError::Store)? {
        None => {
            store.set(group, fingerprint).map_err(HarnessError::Store)?;
            Ok(())
        }
        Some(pinned) if pinned == fingerprint => Ok(()),
        Some(pinned) => Err(HarnessError::IdentityMismatch {
            group: group.to_string(),
            pinned,
            observed: fingerprint.to_string(),
        }),
    }
}
