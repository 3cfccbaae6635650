use super::store::UnitStore;
use super::types::NewUnit;
use crate::error::StoreError;

use anyhow::Result;

/// Splits `[start, end)` into contiguous units of `unit_size`; the last unit may be shorter.
pub fn split_range(base: u32, start: u64, end: u64, unit_size: u64) -> Vec<NewUnit> {
    if unit_size == 0 || end <= start {
        return Vec::new();
    }

    let mut units = Vec::new();
    let mut range_start = start;
    while range_start < end {
        let range_end = range_start.saturating_add(unit_size).min(end);
        units.push(NewUnit {
            base,
            range_start,
            range_end,
            range_size: None,
        });
        range_start = range_end;
    }
    units
}

/// Inserts units, skipping those whose boundaries already exist so reprovisioning
/// after a restart is harmless. Returns the number of units created.
pub fn provision_units(store: &dyn UnitStore, units: Vec<NewUnit>) -> Result<usize> {
    let mut created = 0;
    for unit in units {
        match store.insert_unit(unit.clone()) {
            Ok(_) => created += 1,
            Err(StoreError::UniqueViolation(reason)) => {
                tracing::debug!(
                    "Skipping unit [{}, {}): {}",
                    unit.range_start,
                    unit.range_end,
                    reason
                );
            }
            Err(e) => return Err(anyhow::anyhow!(e)),
        }
    }
    tracing::info!("Provisioned {} new units", created);
    Ok(created)
}
