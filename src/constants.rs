//! Constant types, element sizes, variability masks and the reflected
//! definition record shared by the registry and the parameter objects.

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Raw elements reserved per logical unit (one hardware constant register).
pub const RAW_ELEMENTS_PER_LOGICAL_UNIT: usize = 4;

/// Shader constant type as reported by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GpuConstantType {
    Float1,
    Float2,
    Float3,
    Float4,
    Matrix2x2,
    Matrix2x3,
    Matrix2x4,
    Matrix3x2,
    Matrix3x3,
    Matrix3x4,
    Matrix4x2,
    Matrix4x3,
    Matrix4x4,
    Int1,
    Int2,
    Int3,
    Int4,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

impl GpuConstantType {
    /// True for every type stored in the float buffer (vectors and matrices).
    pub fn is_float(&self) -> bool {
        use GpuConstantType::*;
        matches!(
            self,
            Float1
                | Float2
                | Float3
                | Float4
                | Matrix2x2
                | Matrix2x3
                | Matrix2x4
                | Matrix3x2
                | Matrix3x3
                | Matrix3x4
                | Matrix4x2
                | Matrix4x3
                | Matrix4x4
        )
    }

    pub fn is_int(&self) -> bool {
        matches!(
            self,
            GpuConstantType::Int1
                | GpuConstantType::Int2
                | GpuConstantType::Int3
                | GpuConstantType::Int4
        )
    }

    pub fn is_sampler(&self) -> bool {
        matches!(
            self,
            GpuConstantType::Sampler1D
                | GpuConstantType::Sampler2D
                | GpuConstantType::Sampler3D
                | GpuConstantType::SamplerCube
        )
    }

    /// Number of raw 4-byte elements one entry of this type occupies.
    ///
    /// With `pad_to_multiples_of_4` every row is rounded up to a full
    /// register, which is how register-based programs lay their buffers out.
    /// Matrices pad per row, so a 3x3 takes 12 padded elements.
    pub fn element_size(&self, pad_to_multiples_of_4: bool) -> usize {
        use GpuConstantType::*;
        if pad_to_multiples_of_4 {
            match self {
                Float1 | Float2 | Float3 | Float4 | Int1 | Int2 | Int3 | Int4 | Sampler1D
                | Sampler2D | Sampler3D | SamplerCube => 4,
                Matrix2x2 | Matrix2x3 | Matrix2x4 => 8,
                Matrix3x2 | Matrix3x3 | Matrix3x4 => 12,
                Matrix4x2 | Matrix4x3 | Matrix4x4 => 16,
            }
        } else {
            match self {
                Float1 | Int1 | Sampler1D | Sampler2D | Sampler3D | SamplerCube => 1,
                Float2 | Int2 => 2,
                Float3 | Int3 => 3,
                Float4 | Int4 | Matrix2x2 => 4,
                Matrix2x3 | Matrix3x2 => 6,
                Matrix2x4 | Matrix4x2 => 8,
                Matrix3x3 => 9,
                Matrix3x4 | Matrix4x3 => 12,
                Matrix4x4 => 16,
            }
        }
    }
}

/// How often a constant's value changes. The draw layer uses this to decide
/// how frequently a buffer needs re-uploading.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variability(pub u16);

impl Variability {
    pub const NONE: Variability = Variability(0);
    /// No variation except by manual setting.
    pub const GLOBAL: Variability = Variability(1);
    /// Varies per object (world matrix and friends).
    pub const PER_OBJECT: Variability = Variability(2);
    /// Varies with the light setup.
    pub const LIGHTS: Variability = Variability(4);
    /// Varies with the pass iteration number.
    pub const PASS_ITERATION_NUMBER: Variability = Variability(8);
    pub const ALL: Variability = Variability(0xFFFF);

    #[inline(always)]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[inline(always)]
    pub fn contains(self, other: Variability) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline(always)]
    pub fn intersects(self, other: Variability) -> bool {
        (self.0 & other.0) != 0
    }
}

impl Default for Variability {
    fn default() -> Self {
        Variability::GLOBAL
    }
}

impl BitOr for Variability {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Variability {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Variability {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// A single reflected shader constant. The name lives in the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDefinition {
    pub constant_type: GpuConstantType,
    /// Offset into the float or int buffer (or texture slot for samplers).
    pub physical_index: usize,
    /// Register slot used by low-level programs. Meaningless for
    /// programs that are only ever addressed by name.
    pub logical_index: usize,
    /// Raw elements per entry, register padded where the program needs it.
    pub element_size: usize,
    pub array_size: usize,
    pub variability: Variability,
}

impl ConstantDefinition {
    /// Definition with an element size derived from the type: register
    /// padded for float and int constants, one slot for samplers.
    pub fn new(constant_type: GpuConstantType, physical_index: usize) -> Self {
        Self {
            constant_type,
            physical_index,
            logical_index: 0,
            element_size: constant_type.element_size(!constant_type.is_sampler()),
            array_size: 1,
            variability: Variability::GLOBAL,
        }
    }

    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_element_size(mut self, element_size: usize) -> Self {
        self.element_size = element_size;
        self
    }

    pub fn with_logical_index(mut self, logical_index: usize) -> Self {
        self.logical_index = logical_index;
        self
    }

    pub fn with_variability(mut self, variability: Variability) -> Self {
        self.variability = variability;
        self
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        self.constant_type.is_float()
    }

    #[inline]
    pub fn is_int(&self) -> bool {
        self.constant_type.is_int()
    }

    #[inline]
    pub fn is_sampler(&self) -> bool {
        self.constant_type.is_sampler()
    }

    /// Raw elements covered by the whole array, i.e. one past the last
    /// element relative to `physical_index`.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.element_size * self.array_size.max(1)
    }
}
