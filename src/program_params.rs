//! Per-draw parameter objects.
//!
//! A [`GpuProgramParameters`] owns the raw float/int buffers and texture slots
//! for one use of a compiled program, and holds shared handles to that
//! program's logical index tables and named constant registry. Cloning one
//! deep-copies the buffers and shares the layout.
//!
//! # Example
//!
//! ```rust
//! use gpu_program_params::{GpuConstantType, GpuProgramParametersBuilder, NamedConstants};
//! use glam::Vec4;
//!
//! let mut named = NamedConstants::new();
//! named.allocate("tint", GpuConstantType::Float4, 1);
//!
//! let mut params = GpuProgramParametersBuilder::new()
//!     .named_constants(named.into_shared())
//!     .build()
//!     .unwrap();
//!
//! params.set_named_vec4("tint", Vec4::new(1.0, 0.5, 0.25, 1.0)).unwrap();
//! assert_eq!(&params.float_constants()[..4], &[1.0, 0.5, 0.25, 1.0]);
//! ```

use std::sync::Arc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::constant_store::{RawConstantStore, SamplerState, TextureEntry, TextureHandle};
use crate::constants::{ConstantDefinition, Variability, RAW_ELEMENTS_PER_LOGICAL_UNIT};
use crate::error::{Error, Result};
use crate::logical_index::{LogicalIndexUse, SharedLogicalIndexTable};
use crate::named_constants::SharedNamedConstants;

#[derive(Debug, Clone)]
pub struct GpuProgramParameters {
    store: RawConstantStore,
    float_logical_to_physical: Option<SharedLogicalIndexTable>,
    int_logical_to_physical: Option<SharedLogicalIndexTable>,
    sampler_logical_to_physical: Option<SharedLogicalIndexTable>,
    named_constants: Option<SharedNamedConstants>,
    combined_variability: Variability,
    transpose_matrices: bool,
    ignore_missing_params: bool,
    /// Physical float index bumped by `inc_pass_iteration_number`.
    active_pass_iteration_index: Option<usize>,
}

impl Default for GpuProgramParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuProgramParameters {
    pub fn new() -> Self {
        Self {
            store: RawConstantStore::new(),
            float_logical_to_physical: None,
            int_logical_to_physical: None,
            sampler_logical_to_physical: None,
            named_constants: None,
            combined_variability: Variability::GLOBAL,
            transpose_matrices: false,
            ignore_missing_params: false,
            active_pass_iteration_index: None,
        }
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Attaches a program's registry and zero-extends the local buffers to
    /// the sizes it describes.
    pub fn set_named_constants(&mut self, named_constants: SharedNamedConstants) {
        {
            let named = named_constants.read();
            self.store.reserve_at_least(
                named.float_buffer_size(),
                named.int_buffer_size(),
                named.sampler_count(),
            );
        }
        self.named_constants = Some(named_constants);
    }

    /// Attaches the logical → physical tables of a low-level program. The
    /// local buffers are zero-extended to the tables' current sizes.
    pub fn set_logical_indexes(
        &mut self,
        float_index_map: Option<SharedLogicalIndexTable>,
        int_index_map: Option<SharedLogicalIndexTable>,
        sampler_index_map: Option<SharedLogicalIndexTable>,
    ) {
        let table_size = |table: &Option<SharedLogicalIndexTable>| {
            table.as_ref().map(|t| t.buffer_size()).unwrap_or(0)
        };
        self.store.reserve_at_least(
            table_size(&float_index_map),
            table_size(&int_index_map),
            table_size(&sampler_index_map),
        );
        self.float_logical_to_physical = float_index_map;
        self.int_logical_to_physical = int_index_map;
        self.sampler_logical_to_physical = sampler_index_map;
    }

    pub fn named_constants(&self) -> Option<&SharedNamedConstants> {
        self.named_constants.as_ref()
    }

    pub fn float_logical_buffer(&self) -> Option<&SharedLogicalIndexTable> {
        self.float_logical_to_physical.as_ref()
    }

    pub fn int_logical_buffer(&self) -> Option<&SharedLogicalIndexTable> {
        self.int_logical_to_physical.as_ref()
    }

    pub fn sampler_logical_buffer(&self) -> Option<&SharedLogicalIndexTable> {
        self.sampler_logical_to_physical.as_ref()
    }

    /// True when both objects were built against the same program layout.
    pub fn shares_layout_with(&self, other: &GpuProgramParameters) -> bool {
        fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.float_logical_to_physical, &other.float_logical_to_physical)
            && same(&self.int_logical_to_physical, &other.int_logical_to_physical)
            && same(&self.sampler_logical_to_physical, &other.sampler_logical_to_physical)
            && same(&self.named_constants, &other.named_constants)
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn transpose_matrices(&self) -> bool {
        self.transpose_matrices
    }

    /// Row-major (off) or column-major (on) matrix writes.
    pub fn set_transpose_matrices(&mut self, transpose: bool) {
        self.transpose_matrices = transpose;
    }

    pub fn ignore_missing_params(&self) -> bool {
        self.ignore_missing_params
    }

    /// When on, named setters for unknown names do nothing instead of failing.
    pub fn set_ignore_missing_params(&mut self, ignore: bool) {
        self.ignore_missing_params = ignore;
    }

    pub fn combined_variability(&self) -> Variability {
        self.combined_variability
    }

    pub fn active_pass_iteration_index(&self) -> Option<usize> {
        self.active_pass_iteration_index
    }

    pub fn set_active_pass_iteration_index(&mut self, physical_index: Option<usize>) {
        self.active_pass_iteration_index = physical_index;
    }

    pub fn has_pass_iteration_number(&self) -> bool {
        self.active_pass_iteration_index.is_some()
    }

    // ------------------------------------------------------------------
    // Named constant lookup
    // ------------------------------------------------------------------

    /// Shared registry, or an error if this object has none.
    pub fn constant_definitions(&self) -> Result<SharedNamedConstants> {
        self.named_constants.clone().ok_or(Error::NoNamedConstants)
    }

    pub fn constant_definition(&self, name: &str) -> Result<ConstantDefinition> {
        let named = self.named_constants.as_ref().ok_or(Error::NoNamedConstants)?;
        let def = named.read().get(name).copied();
        def.ok_or_else(|| Error::unknown_parameter(name))
    }

    pub fn find_named_constant_definition(&self, name: &str) -> Option<ConstantDefinition> {
        self.named_constants
            .as_ref()
            .and_then(|named| named.read().get(name).copied())
    }

    pub fn has_named_constant(&self, name: &str) -> bool {
        self.find_named_constant_definition(name).is_some()
    }

    /// Definition to write through, `None` if the name is unknown and
    /// missing parameters are ignored.
    fn named_definition(&self, name: &str) -> Result<Option<ConstantDefinition>> {
        let named = self.named_constants.as_ref().ok_or(Error::NoNamedConstants)?;
        let def = named.read().get(name).copied();
        match def {
            Some(def) => Ok(Some(def)),
            None if self.ignore_missing_params => {
                log::trace!("ignoring write to missing parameter {}", name);
                Ok(None)
            }
            None => Err(Error::unknown_parameter(name)),
        }
    }

    // ------------------------------------------------------------------
    // Named setters
    // ------------------------------------------------------------------

    pub fn set_named_f32(&mut self, name: &str, value: f32) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_f32(def.physical_index, value);
        }
        Ok(())
    }

    pub fn set_named_i32(&mut self, name: &str, value: i32) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_i32(def.physical_index, value);
        }
        Ok(())
    }

    pub fn set_named_vec2(&mut self, name: &str, value: Vec2) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_vec2(def.physical_index, value);
        }
        Ok(())
    }

    pub fn set_named_vec3(&mut self, name: &str, value: Vec3) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_vec3(def.physical_index, value);
        }
        Ok(())
    }

    /// Writes as many components as the definition's element size allows,
    /// up to four. Also used for colours.
    pub fn set_named_vec4(&mut self, name: &str, value: Vec4) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_vec4(def.physical_index, value, def.element_size);
        }
        Ok(())
    }

    pub fn set_named_mat3(&mut self, name: &str, value: &Mat3) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_mat3(def.physical_index, value, def.element_size);
        }
        Ok(())
    }

    pub fn set_named_mat4(&mut self, name: &str, value: &Mat4) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_mat4(def.physical_index, value, def.element_size);
        }
        Ok(())
    }

    pub fn set_named_mat4_array(&mut self, name: &str, values: &[Mat4]) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_mat4_array(def.physical_index, values);
        }
        Ok(())
    }

    /// Writes `count * multiple` raw floats from `values`.
    pub fn set_named_floats(
        &mut self,
        name: &str,
        values: &[f32],
        count: usize,
        multiple: usize,
    ) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_floats(def.physical_index, &values[..count * multiple]);
        }
        Ok(())
    }

    /// Like [`Self::set_named_floats`], narrowing each value to `f32`.
    pub fn set_named_doubles(
        &mut self,
        name: &str,
        values: &[f64],
        count: usize,
        multiple: usize,
    ) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_doubles(def.physical_index, &values[..count * multiple]);
        }
        Ok(())
    }

    pub fn set_named_ints(
        &mut self,
        name: &str,
        values: &[i32],
        count: usize,
        multiple: usize,
    ) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.write_raw_ints(def.physical_index, &values[..count * multiple]);
        }
        Ok(())
    }

    /// Binds a texture; a sampler state already on the slot is kept.
    pub fn set_named_texture(&mut self, name: &str, texture: TextureHandle) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.store.set_texture(def.physical_index, texture);
        }
        Ok(())
    }

    /// Sets a sampler state; a texture already on the slot is kept.
    pub fn set_named_sampler_state(&mut self, name: &str, state: SamplerState) -> Result<()> {
        if let Some(def) = self.named_definition(name)? {
            self.store.set_sampler_state(def.physical_index, state);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Logical index resolution
    // ------------------------------------------------------------------

    /// Resolve-or-grow a float slot. `requested_size` is in raw elements.
    /// `Ok(None)` means the slot is unused by the program.
    pub fn float_constant_logical_index_use(
        &mut self,
        logical_index: usize,
        requested_size: usize,
        variability: Variability,
    ) -> Result<Option<LogicalIndexUse>> {
        let table = self
            .float_logical_to_physical
            .clone()
            .ok_or(Error::NotLowLevel { buffer: "float" })?;
        let named = self.named_constants.clone();

        let used = table.resolve(
            logical_index,
            requested_size,
            variability,
            RAW_ELEMENTS_PER_LOGICAL_UNIT,
            &mut self.store.floats,
            |after, delta| {
                if let Some(named) = named {
                    named.write().shift_float_definitions(after, delta);
                }
            },
        );
        if used.is_some() {
            self.combined_variability |= variability;
        }
        Ok(used)
    }

    /// Int counterpart of [`Self::float_constant_logical_index_use`].
    pub fn int_constant_logical_index_use(
        &mut self,
        logical_index: usize,
        requested_size: usize,
        variability: Variability,
    ) -> Result<Option<LogicalIndexUse>> {
        let table = self
            .int_logical_to_physical
            .clone()
            .ok_or(Error::NotLowLevel { buffer: "int" })?;
        let named = self.named_constants.clone();

        let used = table.resolve(
            logical_index,
            requested_size,
            variability,
            RAW_ELEMENTS_PER_LOGICAL_UNIT,
            &mut self.store.ints,
            |after, delta| {
                if let Some(named) = named {
                    named.write().shift_int_definitions(after, delta);
                }
            },
        );
        if used.is_some() {
            self.combined_variability |= variability;
        }
        Ok(used)
    }

    pub fn float_constant_physical_index(
        &mut self,
        logical_index: usize,
        requested_size: usize,
        variability: Variability,
    ) -> Result<Option<usize>> {
        Ok(self
            .float_constant_logical_index_use(logical_index, requested_size, variability)?
            .map(|used| used.physical_index))
    }

    pub fn int_constant_physical_index(
        &mut self,
        logical_index: usize,
        requested_size: usize,
        variability: Variability,
    ) -> Result<Option<usize>> {
        Ok(self
            .int_constant_logical_index_use(logical_index, requested_size, variability)?
            .map(|used| used.physical_index))
    }

    /// Texture slot for a logical sampler unit; one slot per unit.
    fn sampler_slot(&mut self, logical_index: usize) -> Result<Option<usize>> {
        let table = self
            .sampler_logical_to_physical
            .clone()
            .ok_or(Error::NotLowLevel { buffer: "sampler" })?;
        let used = table.resolve(
            logical_index,
            1,
            Variability::GLOBAL,
            1,
            &mut self.store.textures,
            |_, _| {},
        );
        Ok(used.map(|used| used.physical_index))
    }

    pub fn float_logical_index_for_physical_index(&self, physical_index: usize) -> Option<usize> {
        self.float_logical_to_physical
            .as_ref()
            .and_then(|table| table.logical_index_for_physical(physical_index))
    }

    pub fn int_logical_index_for_physical_index(&self, physical_index: usize) -> Option<usize> {
        self.int_logical_to_physical
            .as_ref()
            .and_then(|table| table.logical_index_for_physical(physical_index))
    }

    // ------------------------------------------------------------------
    // Logical setters
    // ------------------------------------------------------------------

    /// Writes `count` 4-element registers starting at logical `index`.
    pub fn set_constant_floats(
        &mut self,
        index: usize,
        values: &[f32],
        count: usize,
    ) -> Result<()> {
        let raw_count = count * RAW_ELEMENTS_PER_LOGICAL_UNIT;
        if let Some(physical) =
            self.float_constant_physical_index(index, raw_count, Variability::GLOBAL)?
        {
            self.write_raw_floats(physical, &values[..raw_count]);
        }
        Ok(())
    }

    pub fn set_constant_doubles(
        &mut self,
        index: usize,
        values: &[f64],
        count: usize,
    ) -> Result<()> {
        let raw_count = count * RAW_ELEMENTS_PER_LOGICAL_UNIT;
        if let Some(physical) =
            self.float_constant_physical_index(index, raw_count, Variability::GLOBAL)?
        {
            self.write_raw_doubles(physical, &values[..raw_count]);
        }
        Ok(())
    }

    pub fn set_constant_ints(&mut self, index: usize, values: &[i32], count: usize) -> Result<()> {
        let raw_count = count * RAW_ELEMENTS_PER_LOGICAL_UNIT;
        if let Some(physical) =
            self.int_constant_physical_index(index, raw_count, Variability::GLOBAL)?
        {
            self.write_raw_ints(physical, &values[..raw_count]);
        }
        Ok(())
    }

    pub fn set_constant_vec4(&mut self, index: usize, value: Vec4) -> Result<()> {
        self.set_constant_floats(index, &value.to_array(), 1)
    }

    /// Stored as `(value, 0, 0, 0)`.
    pub fn set_constant_f32(&mut self, index: usize, value: f32) -> Result<()> {
        self.set_constant_vec4(index, Vec4::new(value, 0.0, 0.0, 0.0))
    }

    /// Stored as `(x, y, z, 1)`.
    pub fn set_constant_vec3(&mut self, index: usize, value: Vec3) -> Result<()> {
        self.set_constant_vec4(index, value.extend(1.0))
    }

    /// Occupies four consecutive logical registers.
    pub fn set_constant_mat4(&mut self, index: usize, value: &Mat4) -> Result<()> {
        let elements = self.mat4_elements(value);
        self.set_constant_floats(index, &elements, 4)
    }

    /// Four logical registers per matrix, one contiguous run.
    pub fn set_constant_mat4_array(&mut self, index: usize, values: &[Mat4]) -> Result<()> {
        let mut elements = Vec::with_capacity(values.len() * 16);
        for m in values {
            elements.extend_from_slice(&self.mat4_elements(m));
        }
        self.set_constant_floats(index, &elements, values.len() * 4)
    }

    pub fn set_constant_texture(&mut self, index: usize, texture: TextureHandle) -> Result<()> {
        if let Some(slot) = self.sampler_slot(index)? {
            self.store.set_texture(slot, texture);
        }
        Ok(())
    }

    pub fn set_constant_sampler_state(&mut self, index: usize, state: SamplerState) -> Result<()> {
        if let Some(slot) = self.sampler_slot(index)? {
            self.store.set_sampler_state(slot, state);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw access by physical index
    // ------------------------------------------------------------------

    pub fn write_raw_f32(&mut self, physical_index: usize, value: f32) {
        self.store.write_floats(physical_index, &[value]);
    }

    pub fn write_raw_i32(&mut self, physical_index: usize, value: i32) {
        self.store.write_ints(physical_index, &[value]);
    }

    pub fn write_raw_vec2(&mut self, physical_index: usize, value: Vec2) {
        self.store.write_floats(physical_index, &value.to_array());
    }

    pub fn write_raw_vec3(&mut self, physical_index: usize, value: Vec3) {
        self.store.write_floats(physical_index, &value.to_array());
    }

    /// Writes `min(count, 4)` components, for packed types.
    pub fn write_raw_vec4(&mut self, physical_index: usize, value: Vec4, count: usize) {
        let components = value.to_array();
        self.store
            .write_floats(physical_index, &components[..count.min(4)]);
    }

    /// Writes at most nine elements whatever `element_count` claims.
    pub fn write_raw_mat3(&mut self, physical_index: usize, value: &Mat3, element_count: usize) {
        let elements = self.mat3_elements(value);
        self.store
            .write_floats(physical_index, &elements[..element_count.min(9)]);
    }

    /// Writes at most sixteen elements whatever `element_count` claims.
    pub fn write_raw_mat4(&mut self, physical_index: usize, value: &Mat4, element_count: usize) {
        let elements = self.mat4_elements(value);
        self.store
            .write_floats(physical_index, &elements[..element_count.min(16)]);
    }

    pub fn write_raw_mat4_array(&mut self, physical_index: usize, values: &[Mat4]) {
        let mut physical = physical_index;
        for m in values {
            let elements = self.mat4_elements(m);
            self.store.write_floats(physical, &elements);
            physical += 16;
        }
    }

    pub fn write_raw_floats(&mut self, physical_index: usize, values: &[f32]) {
        self.store.write_floats(physical_index, values);
    }

    pub fn write_raw_doubles(&mut self, physical_index: usize, values: &[f64]) {
        self.store.write_doubles(physical_index, values);
    }

    pub fn write_raw_ints(&mut self, physical_index: usize, values: &[i32]) {
        self.store.write_ints(physical_index, values);
    }

    pub fn read_raw_floats(&self, physical_index: usize, dest: &mut [f32]) {
        self.store.read_floats(physical_index, dest);
    }

    pub fn read_raw_ints(&self, physical_index: usize, dest: &mut [i32]) {
        self.store.read_ints(physical_index, dest);
    }

    pub fn read_texture(&self, physical_index: usize) -> Option<TextureHandle> {
        self.store.texture(physical_index)
    }

    // row-major unless transposing, in which case column-major
    fn mat4_elements(&self, m: &Mat4) -> [f32; 16] {
        if self.transpose_matrices {
            m.to_cols_array()
        } else {
            m.transpose().to_cols_array()
        }
    }

    fn mat3_elements(&self, m: &Mat3) -> [f32; 9] {
        if self.transpose_matrices {
            m.to_cols_array()
        } else {
            m.transpose().to_cols_array()
        }
    }

    // ------------------------------------------------------------------
    // Upload side
    // ------------------------------------------------------------------

    pub fn float_constants(&self) -> &[f32] {
        self.store.floats()
    }

    pub fn int_constants(&self) -> &[i32] {
        self.store.ints()
    }

    pub fn float_constants_bytes(&self) -> &[u8] {
        self.store.float_bytes()
    }

    pub fn int_constants_bytes(&self) -> &[u8] {
        self.store.int_bytes()
    }

    pub fn texture_entries(&self) -> &[Option<TextureEntry>] {
        self.store.textures()
    }

    pub fn texture(&self, slot: usize) -> Option<TextureHandle> {
        self.store.texture(slot)
    }

    pub fn sampler_state(&self, slot: usize) -> SamplerState {
        self.store.sampler_state(slot)
    }

    /// Takes over another object's float and int values and variability.
    /// Both objects are assumed to share a layout.
    pub fn copy_constants_from(&mut self, source: &GpuProgramParameters) {
        self.store.copy_constants_from(&source.store);
        self.combined_variability = source.combined_variability;
    }

    /// Bumps the pass iteration counter in place, if one is configured.
    pub fn inc_pass_iteration_number(&mut self) {
        if let Some(physical_index) = self.active_pass_iteration_index {
            self.store.increment_float(physical_index);
        }
    }
}

/// Builder for parameter objects bound to a program layout.
#[derive(Debug, Default)]
pub struct GpuProgramParametersBuilder {
    named_constants: Option<SharedNamedConstants>,
    float_logical: Option<SharedLogicalIndexTable>,
    int_logical: Option<SharedLogicalIndexTable>,
    sampler_logical: Option<SharedLogicalIndexTable>,
    transpose_matrices: bool,
    ignore_missing_params: bool,
    pass_iteration_constant: Option<String>,
}

impl GpuProgramParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named_constants(mut self, named_constants: SharedNamedConstants) -> Self {
        self.named_constants = Some(named_constants);
        self
    }

    pub fn logical_indexes(
        mut self,
        float: Option<SharedLogicalIndexTable>,
        int: Option<SharedLogicalIndexTable>,
        sampler: Option<SharedLogicalIndexTable>,
    ) -> Self {
        self.float_logical = float;
        self.int_logical = int;
        self.sampler_logical = sampler;
        self
    }

    pub fn transpose_matrices(mut self, transpose: bool) -> Self {
        self.transpose_matrices = transpose;
        self
    }

    pub fn ignore_missing_params(mut self, ignore: bool) -> Self {
        self.ignore_missing_params = ignore;
        self
    }

    /// Named float constant that `inc_pass_iteration_number` bumps.
    pub fn pass_iteration_constant(mut self, name: impl Into<String>) -> Self {
        self.pass_iteration_constant = Some(name.into());
        self
    }

    pub fn build(self) -> Result<GpuProgramParameters> {
        let mut params = GpuProgramParameters::new();
        params.transpose_matrices = self.transpose_matrices;
        params.ignore_missing_params = self.ignore_missing_params;
        if let Some(named) = self.named_constants {
            params.set_named_constants(named);
        }
        params.set_logical_indexes(self.float_logical, self.int_logical, self.sampler_logical);

        if let Some(name) = self.pass_iteration_constant {
            let def = params
                .constant_definition(&name)
                .map_err(|e| e.context("resolving pass iteration constant"))?;
            if !def.is_float() {
                return Err(Error::custom(format!(
                    "pass iteration constant {} is not a float constant",
                    name
                )));
            }
            params.active_pass_iteration_index = Some(def.physical_index);
        }

        Ok(params)
    }
}
