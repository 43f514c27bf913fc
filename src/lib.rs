// src/lib.rs
//! CPU-side GPU program parameter buffers.
//!
//! Engine code sets shader inputs by name or by register slot; this crate
//! turns those calls into writes on flat float/int buffers and texture slots
//! that the graphics backend uploads at draw time.
//!
//! - [`named_constants`]: name → definition registry, one per program.
//! - [`logical_index`]: shared, lock-guarded register slot → offset tables.
//! - [`constant_store`]: the raw buffers themselves.
//! - [`program_params`]: the per-draw facade tying them together.

pub mod constant_store;
pub mod constants;
pub mod error;
pub mod logical_index;
pub mod named_constants;
pub mod program_params;

pub use constant_store::{
    AddressMode, FilterMode, RawConstantStore, SamplerState, TextureEntry, TextureHandle,
};
pub use constants::{ConstantDefinition, GpuConstantType, Variability};
pub use error::{Error, Result};
pub use logical_index::{LogicalIndexTable, LogicalIndexUse, SharedLogicalIndexTable};
pub use named_constants::{
    generate_all_constant_definition_array_entries,
    set_generate_all_constant_definition_array_entries, NamedConstants, SharedNamedConstants,
};
pub use program_params::{GpuProgramParameters, GpuProgramParametersBuilder};

pub use glam;
