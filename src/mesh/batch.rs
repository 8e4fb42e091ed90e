//! Meshes as ordered display commands

use crate::math::Aabb;

use super::vertex::{Triangle, Vertex};

/// Ordered triangles sharing one render state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleBatch {
    pub triangles: Vec<Triangle>,
}

impl TriangleBatch {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// One element of a model's display list.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayCommand {
    /// Triangles, compiled into vertex loads and draw commands.
    Triangles(TriangleBatch),
    /// Wait for the rasterizer pipeline to drain.
    PipeSync,
    /// Clear then set geometry mode bits (culling, lighting, shading).
    GeometryMode { clear: u32, set: u32 },
    /// Any other two-word command, carried verbatim.
    Raw([u32; 2]),
}

/// Geometry mode bits the editor exposes.
pub mod geometry_mode {
    pub const CULL_BACK: u32 = 0x0000_0400;
    pub const LIGHTING: u32 = 0x0002_0000;
    pub const SHADING_SMOOTH: u32 = 0x0020_0000;
}

/// A model's display list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub commands: Vec<DisplayCommand>,
}

impl Mesh {
    /// Mesh holding a single triangle batch.
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        Self {
            commands: vec![DisplayCommand::Triangles(TriangleBatch::new(triangles))],
        }
    }

    pub fn push(&mut self, command: DisplayCommand) {
        self.commands.push(command);
    }

    /// All triangles in display-list order.
    pub fn triangles(&self) -> impl Iterator<Item = &Triangle> + '_ {
        self.commands.iter().flat_map(|cmd| match cmd {
            DisplayCommand::Triangles(batch) => batch.triangles.as_slice(),
            _ => &[],
        })
    }

    /// All triangle vertices in display-list order, duplicates included.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.triangles().flat_map(|t| t.vertices.iter())
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().count()
    }

    /// Local bounds of the mesh vertices.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices().map(Vertex::position_vec3))
    }

    /// Commands with adjacent triangle batches merged and empty batches dropped.
    ///
    /// Two batches with nothing between them compile to the same command
    /// stream a decompiler reads back as one batch, so they are packed as one.
    pub fn coalesced(&self) -> Vec<DisplayCommand> {
        let mut out: Vec<DisplayCommand> = Vec::with_capacity(self.commands.len());
        for cmd in &self.commands {
            match cmd {
                DisplayCommand::Triangles(batch) if batch.is_empty() => {}
                DisplayCommand::Triangles(batch) => match out.last_mut() {
                    Some(DisplayCommand::Triangles(prev)) => {
                        prev.triangles.extend_from_slice(&batch.triangles)
                    }
                    _ => out.push(cmd.clone()),
                },
                other => out.push(other.clone()),
            }
        }
        out
    }
}
