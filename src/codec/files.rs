//! Reading and writing codec output on disk
//!
//! Files are written to a temporary sibling first and renamed into place, so
//! a failed compile never leaves a truncated file behind.

use std::fs;
use std::path::Path;

use log::info;

use crate::core::Result;
use crate::hit::{CollisionTrees, HitTree};
use crate::scene::ModelTree;

use super::collision::{compile_collision, decompile_collision};
use super::config::CompileConfig;
use super::geometry::{compile_geometry, decompile_geometry, TextureResolver};
use super::header::{write_index_header, IndexEntry};
use super::report::Decompiled;

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Compile a model tree and write it to `path`. Returns the file size.
pub fn save_shape(
    path: &Path,
    tree: &ModelTree,
    textures: &dyn TextureResolver,
    config: &CompileConfig,
) -> Result<usize> {
    let bytes = compile_geometry(tree, textures, config)?;
    write_atomic(path, &bytes)?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes.len())
}

pub fn load_shape(path: &Path, config: &CompileConfig) -> Result<Decompiled<ModelTree>> {
    let bytes = fs::read(path)?;
    decompile_geometry(&bytes, config)
}

/// Compile both collision trees and write them to `path`. Returns the file size.
pub fn save_hit(path: &Path, colliders: &HitTree, zones: &HitTree) -> Result<usize> {
    let bytes = compile_collision(colliders, zones)?;
    write_atomic(path, &bytes)?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes.len())
}

pub fn load_hit(path: &Path) -> Result<Decompiled<CollisionTrees>> {
    let bytes = fs::read(path)?;
    decompile_collision(&bytes)
}

/// Write a `#define` index header for game scripts.
pub fn save_index_header(path: &Path, prefix: &str, entries: &[IndexEntry]) -> Result<()> {
    write_atomic(path, write_index_header(prefix, entries).as_bytes())
}
