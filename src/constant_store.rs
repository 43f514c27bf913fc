//! Raw constant store: the flat float/int buffers and texture slots that the
//! upload layer copies to the device.
//!
//! Everything here is addressed by physical index. Reading or writing past the
//! end of a buffer is a broken layout invariant and panics.

/// Opaque texture handle owned by the graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Texture filter mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FilterMode {
    Nearest = 0,
    #[default]
    Linear = 1,
    Anisotropic = 2,
}

/// Texture address mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AddressMode {
    #[default]
    Repeat = 0,
    MirroredRepeat = 1,
    ClampToEdge = 2,
    ClampToBorder = 3,
}

/// Sampler state bound next to a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub max_anisotropy: u32,
    pub lod_bias: f32,
}

impl SamplerState {
    /// State reported for slots that were never given one.
    pub const EMPTY: SamplerState = SamplerState {
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        mip_filter: FilterMode::Linear,
        address_u: AddressMode::Repeat,
        address_v: AddressMode::Repeat,
        address_w: AddressMode::Repeat,
        max_anisotropy: 1,
        lod_bias: 0.0,
    };
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Texture and sampler bound to one slot. Either half may be set alone.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureEntry {
    pub texture: Option<TextureHandle>,
    pub sampler_state: SamplerState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConstantStore {
    pub(crate) floats: Vec<f32>,
    pub(crate) ints: Vec<i32>,
    pub(crate) textures: Vec<Option<TextureEntry>>,
}

impl RawConstantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn floats(&self) -> &[f32] {
        &self.floats
    }

    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    pub fn textures(&self) -> &[Option<TextureEntry>] {
        &self.textures
    }

    pub fn float_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.floats)
    }

    pub fn int_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.ints)
    }

    /// Zero-extends each buffer to at least the given size. Never shrinks.
    pub fn reserve_at_least(&mut self, floats: usize, ints: usize, texture_slots: usize) {
        if floats > self.floats.len() {
            self.floats.resize(floats, 0.0);
        }
        if ints > self.ints.len() {
            self.ints.resize(ints, 0);
        }
        if texture_slots > self.textures.len() {
            self.textures.resize(texture_slots, None);
        }
    }

    #[inline]
    pub fn write_floats(&mut self, physical_index: usize, values: &[f32]) {
        check_range(physical_index, values.len(), self.floats.len(), "float");
        self.floats[physical_index..physical_index + values.len()].copy_from_slice(values);
    }

    /// Narrows each value to single precision individually.
    pub fn write_doubles(&mut self, physical_index: usize, values: &[f64]) {
        check_range(physical_index, values.len(), self.floats.len(), "float");
        let dest = &mut self.floats[physical_index..physical_index + values.len()];
        for (dst, src) in dest.iter_mut().zip(values) {
            *dst = *src as f32;
        }
    }

    #[inline]
    pub fn write_ints(&mut self, physical_index: usize, values: &[i32]) {
        check_range(physical_index, values.len(), self.ints.len(), "int");
        self.ints[physical_index..physical_index + values.len()].copy_from_slice(values);
    }

    pub fn read_floats(&self, physical_index: usize, dest: &mut [f32]) {
        check_range(physical_index, dest.len(), self.floats.len(), "float");
        dest.copy_from_slice(&self.floats[physical_index..physical_index + dest.len()]);
    }

    pub fn read_ints(&self, physical_index: usize, dest: &mut [i32]) {
        check_range(physical_index, dest.len(), self.ints.len(), "int");
        dest.copy_from_slice(&self.ints[physical_index..physical_index + dest.len()]);
    }

    /// Adds one to the float at `physical_index`.
    pub fn increment_float(&mut self, physical_index: usize) {
        check_range(physical_index, 1, self.floats.len(), "float");
        self.floats[physical_index] += 1.0;
    }

    pub fn set_texture(&mut self, slot: usize, texture: TextureHandle) {
        self.entry_mut(slot).texture = Some(texture);
    }

    pub fn set_sampler_state(&mut self, slot: usize, state: SamplerState) {
        self.entry_mut(slot).sampler_state = state;
    }

    /// Texture bound at `slot`, if any.
    pub fn texture(&self, slot: usize) -> Option<TextureHandle> {
        check_range(slot, 1, self.textures.len(), "texture");
        self.textures[slot].and_then(|entry| entry.texture)
    }

    /// Sampler state at `slot`, [`SamplerState::EMPTY`] if never set.
    pub fn sampler_state(&self, slot: usize) -> SamplerState {
        check_range(slot, 1, self.textures.len(), "texture");
        self.textures[slot]
            .map(|entry| entry.sampler_state)
            .unwrap_or(SamplerState::EMPTY)
    }

    /// Replaces the float and int buffers; texture slots are kept.
    pub fn copy_constants_from(&mut self, other: &RawConstantStore) {
        self.floats.clone_from(&other.floats);
        self.ints.clone_from(&other.ints);
    }

    fn entry_mut(&mut self, slot: usize) -> &mut TextureEntry {
        check_range(slot, 1, self.textures.len(), "texture");
        self.textures[slot].get_or_insert_with(TextureEntry::default)
    }
}

#[inline]
#[track_caller]
fn check_range(physical_index: usize, count: usize, len: usize, buffer: &str) {
    assert!(
        physical_index + count <= len,
        "{} buffer access out of range: {}..{} of {}",
        buffer,
        physical_index,
        physical_index + count,
        len
    );
}
