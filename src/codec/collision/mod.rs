//! Collision and zone file codec

pub mod compiler;
pub mod decompiler;

pub use compiler::{compile_collision, pack_triangle, MAX_VERTICES};
pub use decompiler::decompile_collision;
