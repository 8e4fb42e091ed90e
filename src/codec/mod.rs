//! Binary codecs for map geometry and collision files
//!
//! Every public entry point is a pure function over byte slices and trees;
//! [`files`] wraps them for paths on disk.

pub mod collision;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod files;
pub mod gbi;
pub mod geometry;
pub mod header;
pub mod names;
pub mod report;
pub mod stream;

pub use collision::{compile_collision, decompile_collision};
pub use config::{CompileConfig, SizeBudget};
pub use extract::{extract_static_geometry, StaticGeometry};
pub use geometry::{
    compile_geometry, decompile_geometry, LegacyTextureNames, PassthroughTextures,
    TextureResolver,
};
pub use header::{hit_index_entries, model_index_entries, write_index_header, IndexEntry};
pub use names::{read_name_tables, NameTables};
pub use report::{Decompiled, Warning};

#[cfg(test)]
mod tests;
