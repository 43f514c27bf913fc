//! Logical → physical index tables.
//!
//! Low-level programs address constants by register slot ("logical index").
//! The first parameter object that writes a slot decides where it lives in
//! the flat buffer; every other parameter object built against the same
//! compiled program shares the table and so agrees on the layout.
//!
//! A resolution returns a copy of the entry, never a reference into the
//! table. Any resolution that grows the buffer may move other entries, so
//! physical indices must be re-resolved after every potentially growing call.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::constants::Variability;

/// Where a logical slot lives and how much room it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalIndexUse {
    pub physical_index: usize,
    /// Raw elements reserved by the run this slot was created in.
    pub current_size: usize,
    pub variability: Variability,
}

impl LogicalIndexUse {
    pub fn new(physical_index: usize, current_size: usize, variability: Variability) -> Self {
        Self {
            physical_index,
            current_size,
            variability,
        }
    }
}

#[derive(Debug, Default)]
struct LogicalBuffer {
    map: BTreeMap<usize, LogicalIndexUse>,
    buffer_size: usize,
}

/// Table handle shared between a program and its parameter objects.
pub type SharedLogicalIndexTable = Arc<LogicalIndexTable>;

/// Mutex guarded logical → physical map for one buffer of one program layout.
#[derive(Debug, Default)]
pub struct LogicalIndexTable {
    inner: Mutex<LogicalBuffer>,
}

impl LogicalIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-sized by reflection; the entries still appear lazily.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            inner: Mutex::new(LogicalBuffer {
                map: BTreeMap::new(),
                buffer_size,
            }),
        }
    }

    pub fn shared() -> SharedLogicalIndexTable {
        Arc::new(Self::new())
    }

    /// Cached size of the buffer described by this table.
    pub fn buffer_size(&self) -> usize {
        self.inner.lock().buffer_size
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    pub fn get(&self, logical_index: usize) -> Option<LogicalIndexUse> {
        self.inner.lock().map.get(&logical_index).copied()
    }

    /// Snapshot of all entries in logical order.
    pub fn entries(&self) -> Vec<(usize, LogicalIndexUse)> {
        self.inner
            .lock()
            .map
            .iter()
            .map(|(logical, entry)| (*logical, *entry))
            .collect()
    }

    /// Logical slot whose entry starts exactly at `physical_index`.
    pub fn logical_index_for_physical(&self, physical_index: usize) -> Option<usize> {
        self.inner
            .lock()
            .map
            .iter()
            .find(|(_, entry)| entry.physical_index == physical_index)
            .map(|(logical, _)| *logical)
    }

    /// Resolve-or-grow. The whole sequence runs under the table lock.
    ///
    /// `buffer` is the calling parameter object's store for this table; it is
    /// first zero-extended to the table's size, then grown as needed.
    /// `slot_stride` is the number of raw elements one logical slot spans.
    /// `on_shift(after, delta)` runs, still under the lock, when a mid-buffer
    /// insertion moved everything past `after` forward by `delta`.
    ///
    /// Returns `None` when the slot is unmapped and `requested_size` is zero:
    /// the program does not use it and the write should be skipped.
    pub(crate) fn resolve<T, F>(
        &self,
        logical_index: usize,
        requested_size: usize,
        variability: Variability,
        slot_stride: usize,
        buffer: &mut Vec<T>,
        on_shift: F,
    ) -> Option<LogicalIndexUse>
    where
        T: Clone + Default,
        F: FnOnce(usize, usize),
    {
        debug_assert!(slot_stride > 0);
        let mut table = self.inner.lock();

        if buffer.len() < table.buffer_size {
            buffer.resize(table.buffer_size, T::default());
        }

        let resolved = match table.map.get(&logical_index).copied() {
            None if requested_size == 0 => return None,
            None => {
                let physical_index = buffer.len();
                buffer.resize(physical_index + requested_size, T::default());
                table.buffer_size = buffer.len();

                // Populate every slot the run spans so that programs declaring
                // an array one register at a time find the later registers.
                // Slots that are already mapped keep their location.
                let slots = (requested_size / slot_stride).max(1);
                let mut current = physical_index;
                for slot in 0..slots {
                    table
                        .map
                        .entry(logical_index + slot)
                        .or_insert(LogicalIndexUse::new(current, requested_size, variability));
                    current += slot_stride;
                }

                log::debug!(
                    "logical index {} mapped to physical {} ({} elements, {} slots)",
                    logical_index,
                    physical_index,
                    requested_size,
                    slots
                );
                physical_index
            }
            Some(existing) => {
                let physical_index = existing.physical_index;
                if existing.current_size < requested_size {
                    // The first use under-reserved, e.g. a variable length
                    // array whose real size only shows up now.
                    let insert_count = requested_size - existing.current_size;
                    let insert_at = physical_index.min(buffer.len());
                    buffer.splice(
                        insert_at..insert_at,
                        std::iter::repeat(T::default()).take(insert_count),
                    );

                    for entry in table.map.values_mut() {
                        if entry.physical_index > physical_index {
                            entry.physical_index += insert_count;
                        }
                    }
                    table.buffer_size += insert_count;
                    on_shift(physical_index, insert_count);

                    if let Some(entry) = table.map.get_mut(&logical_index) {
                        entry.current_size += insert_count;
                    }

                    log::debug!(
                        "logical index {} grew by {} elements at physical {}",
                        logical_index,
                        insert_count,
                        physical_index
                    );
                }
                physical_index
            }
        };

        let entry = table.map.get_mut(&logical_index)?;
        debug_assert_eq!(entry.physical_index, resolved);
        entry.variability = variability;
        Some(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(
        table: &LogicalIndexTable,
        buffer: &mut Vec<f32>,
        logical: usize,
        size: usize,
    ) -> Option<LogicalIndexUse> {
        table.resolve(logical, size, Variability::GLOBAL, 4, buffer, |_, _| {})
    }

    #[test]
    fn test_first_resolution_appends_run() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();

        let entry = resolve(&table, &mut buffer, 5, 16).unwrap();

        assert_eq!(entry.physical_index, 0);
        assert_eq!(buffer.len(), 16);
        assert!(buffer.iter().all(|v| *v == 0.0));
        assert_eq!(table.buffer_size(), 16);
        let physical: Vec<_> = table
            .entries()
            .into_iter()
            .map(|(logical, e)| (logical, e.physical_index))
            .collect();
        assert_eq!(physical, vec![(5, 0), (6, 4), (7, 8), (8, 12)]);
    }

    #[test]
    fn test_second_run_starts_at_previous_size() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();
        resolve(&table, &mut buffer, 0, 8);

        let before = buffer.len();
        let entry = resolve(&table, &mut buffer, 10, 4).unwrap();

        assert_eq!(entry.physical_index, before);
        assert_eq!(buffer.len(), before + 4);
    }

    #[test]
    fn test_zero_request_on_unmapped_slot_is_unbound() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();

        assert!(resolve(&table, &mut buffer, 3, 0).is_none());
        assert!(buffer.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_smaller_request_is_stable() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();
        resolve(&table, &mut buffer, 0, 4);
        let first = resolve(&table, &mut buffer, 1, 8).unwrap();

        let again = resolve(&table, &mut buffer, 1, 4).unwrap();
        let zero = resolve(&table, &mut buffer, 1, 0).unwrap();

        assert_eq!(again.physical_index, first.physical_index);
        assert_eq!(zero.physical_index, first.physical_index);
        assert_eq!(buffer.len(), 12);
    }

    #[test]
    fn test_larger_request_inserts_and_shifts() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();
        resolve(&table, &mut buffer, 0, 4);
        resolve(&table, &mut buffer, 1, 4);
        resolve(&table, &mut buffer, 2, 4);
        buffer[8] = 7.0;

        let mut shifted = None;
        let entry = table
            .resolve(0, 12, Variability::PER_OBJECT, 4, &mut buffer, |after, delta| {
                shifted = Some((after, delta))
            })
            .unwrap();

        assert_eq!(entry.physical_index, 0);
        assert_eq!(entry.current_size, 12);
        assert_eq!(entry.variability, Variability::PER_OBJECT);
        assert_eq!(shifted, Some((0, 8)));
        assert_eq!(buffer.len(), 20);
        assert_eq!(table.buffer_size(), 20);
        assert_eq!(table.get(1).unwrap().physical_index, 12);
        assert_eq!(table.get(2).unwrap().physical_index, 16);
        // data of a shifted slot travels with it
        assert_eq!(buffer[16], 7.0);
    }

    #[test]
    fn test_new_run_keeps_already_mapped_slots() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();
        resolve(&table, &mut buffer, 7, 4);

        let run = resolve(&table, &mut buffer, 5, 16).unwrap();

        assert_eq!(run.physical_index, 4);
        assert_eq!(table.get(6).unwrap().physical_index, 8);
        assert_eq!(table.get(7).unwrap().physical_index, 0);
        assert_eq!(table.get(8).unwrap().physical_index, 16);
        assert_eq!(buffer.len(), 20);
    }

    #[test]
    fn test_variability_last_writer_wins() {
        let table = LogicalIndexTable::new();
        let mut buffer: Vec<f32> = Vec::new();
        table.resolve(0, 4, Variability::GLOBAL, 4, &mut buffer, |_, _| {});
        table.resolve(0, 4, Variability::LIGHTS, 4, &mut buffer, |_, _| {});

        assert_eq!(table.get(0).unwrap().variability, Variability::LIGHTS);
    }

    #[test]
    fn test_stale_buffer_is_padded_to_table_size() {
        let table = LogicalIndexTable::with_buffer_size(8);
        let mut buffer: Vec<f32> = Vec::new();

        let entry = resolve(&table, &mut buffer, 0, 4).unwrap();

        assert_eq!(entry.physical_index, 8);
        assert_eq!(buffer.len(), 12);
    }

    #[test]
    fn test_reverse_lookup() {
        let table = LogicalIndexTable::new();
        let mut buffer = Vec::new();
        resolve(&table, &mut buffer, 3, 8);

        assert_eq!(table.logical_index_for_physical(4), Some(4));
        assert_eq!(table.logical_index_for_physical(2), None);
    }

    #[test]
    fn test_unit_stride_for_samplers() {
        let table = LogicalIndexTable::new();
        let mut slots: Vec<Option<u32>> = Vec::new();

        let entry = table
            .resolve(2, 3, Variability::GLOBAL, 1, &mut slots, |_, _| {})
            .unwrap();

        assert_eq!(entry.physical_index, 0);
        assert_eq!(slots.len(), 3);
        assert_eq!(table.get(4).unwrap().physical_index, 2);
    }

    #[test]
    fn test_concurrent_growers_never_overlap() {
        let table = Arc::new(LogicalIndexTable::new());

        std::thread::scope(|scope| {
            for worker in 0..4usize {
                let table = Arc::clone(&table);
                scope.spawn(move || {
                    let mut buffer: Vec<f32> = Vec::new();
                    for i in 0..32usize {
                        let logical = worker * 1000 + i * 4;
                        table.resolve(logical, 4, Variability::GLOBAL, 4, &mut buffer, |_, _| {});
                    }
                });
            }
        });

        let mut starts: Vec<usize> = table
            .entries()
            .into_iter()
            .map(|(_, e)| e.physical_index)
            .collect();
        starts.sort_unstable();
        starts.dedup();
        assert_eq!(starts.len(), 4 * 32);
        assert_eq!(table.buffer_size(), 4 * 32 * 4);
    }
}
