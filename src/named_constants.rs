//! Named constant registry: human readable parameter names resolved to
//! reflected definitions, including synthesized `name[i]` array accessors.
//!
//! One registry exists per compiled program and is shared by every parameter
//! object built for it. Lookups only need the read lock; the write lock is
//! taken while a logical index table shifts physical offsets after a
//! mid-buffer insertion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::constants::{ConstantDefinition, GpuConstantType};

/// Array entries synthesized per array parameter unless generate-all is on.
pub const MAX_GENERATED_ARRAY_ENTRIES: usize = 16;

static GENERATE_ALL_ARRAY_ENTRIES: AtomicBool = AtomicBool::new(false);

/// Whether every `name[i]` accessor is generated for large arrays, not just
/// the first [`MAX_GENERATED_ARRAY_ENTRIES`]. Process wide.
pub fn generate_all_constant_definition_array_entries() -> bool {
    GENERATE_ALL_ARRAY_ENTRIES.load(Ordering::Relaxed)
}

/// Only affects registries populated after the call.
pub fn set_generate_all_constant_definition_array_entries(generate_all: bool) {
    GENERATE_ALL_ARRAY_ENTRIES.store(generate_all, Ordering::Relaxed);
}

/// Registry handle shared between a program and its parameter objects.
pub type SharedNamedConstants = Arc<RwLock<NamedConstants>>;

#[derive(Debug, Clone, Default)]
pub struct NamedConstants {
    map: HashMap<String, ConstantDefinition>,
    float_buffer_size: usize,
    int_buffer_size: usize,
    sampler_count: usize,
}

impl NamedConstants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedNamedConstants {
        Arc::new(RwLock::new(self))
    }

    /// Registers a reflected definition as-is, plus its array accessors when
    /// `array_size > 1`, and grows the cached buffer sizes to cover it.
    pub fn define(&mut self, name: impl Into<String>, def: ConstantDefinition) {
        let name = name.into();
        let end = def.physical_index + def.total_size();
        if def.is_float() {
            self.float_buffer_size = self.float_buffer_size.max(end);
        } else if def.is_int() {
            self.int_buffer_size = self.int_buffer_size.max(end);
        } else {
            self.sampler_count = self.sampler_count.max(end);
        }

        if def.array_size > 1 {
            self.generate_constant_definition_array_entries(&name, &def);
        }
        self.map.insert(name, def);
    }

    /// Places a new constant at the end of the matching buffer and defines it.
    /// Float and int constants are register padded; samplers take one slot
    /// per entry.
    pub fn allocate(
        &mut self,
        name: impl Into<String>,
        constant_type: GpuConstantType,
        array_size: usize,
    ) -> ConstantDefinition {
        let physical_index = if constant_type.is_float() {
            self.float_buffer_size
        } else if constant_type.is_int() {
            self.int_buffer_size
        } else {
            self.sampler_count
        };
        let def =
            ConstantDefinition::new(constant_type, physical_index).with_array_size(array_size);
        self.define(name, def);
        def
    }

    /// Adds `param[0]`, `param[1]`, ... accessors for an array definition.
    ///
    /// `[0]` shares the base location. At most
    /// [`MAX_GENERATED_ARRAY_ENTRIES`] are created unless generate-all is on.
    /// Buffer sizes are not touched since the storage belongs to the base.
    pub fn generate_constant_definition_array_entries(
        &mut self,
        param_name: &str,
        base_def: &ConstantDefinition,
    ) {
        self.generate_array_entries_with(
            param_name,
            base_def,
            generate_all_constant_definition_array_entries(),
        );
    }

    pub(crate) fn generate_array_entries_with(
        &mut self,
        param_name: &str,
        base_def: &ConstantDefinition,
        generate_all: bool,
    ) {
        let mut entry_def = *base_def;
        entry_def.array_size = 1;

        let count = if generate_all {
            base_def.array_size
        } else {
            base_def.array_size.min(MAX_GENERATED_ARRAY_ENTRIES)
        };

        for i in 0..count.max(1) {
            self.map.insert(format!("{}[{}]", param_name, i), entry_def);
            entry_def.physical_index += entry_def.element_size;
        }
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&ConstantDefinition> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstantDefinition)> {
        self.map.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn float_buffer_size(&self) -> usize {
        self.float_buffer_size
    }

    pub fn int_buffer_size(&self) -> usize {
        self.int_buffer_size
    }

    pub fn sampler_count(&self) -> usize {
        self.sampler_count
    }

    /// Moves every float definition starting after `after` forward by `delta`.
    pub(crate) fn shift_float_definitions(&mut self, after: usize, delta: usize) {
        for def in self.map.values_mut() {
            if def.is_float() && def.physical_index > after {
                def.physical_index += delta;
            }
        }
        self.float_buffer_size += delta;
    }

    /// Int counterpart of [`Self::shift_float_definitions`]. Samplers are
    /// left alone; they index texture slots, not the int buffer.
    pub(crate) fn shift_int_definitions(&mut self, after: usize, delta: usize) {
        for def in self.map.values_mut() {
            if def.is_int() && def.physical_index > after {
                def.physical_index += delta;
            }
        }
        self.int_buffer_size += delta;
    }
}
