//! Render geometry file codec

pub mod compiler;
pub mod decompiler;

pub use compiler::{
    compile_geometry, LegacyTextureNames, PassthroughTextures, TextureResolver, HEADER_SIZE,
};
pub use decompiler::{decompile_geometry, MAX_LIST_DEPTH};
