//! Model tree node types
//!
//! Node IDs, group/model content variants and raw properties.

use crate::mesh::{DisplayCommand, Mesh};

use super::light::LightSetId;
use super::transform::TransformMatrix;

/// Unique identifier for a node in a [`ModelTree`](super::ModelTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeNodeId(pub u32);

/// Raw `(key, kind, value)` property carried verbatim through compile and decompile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Property {
    pub key: u32,
    pub kind: u32,
    pub value: u32,
}

impl Property {
    pub const fn new(key: u32, kind: u32, value: u32) -> Self {
        Self { key, kind, value }
    }
}

/// Property keys the codec writes itself.
pub mod property_key {
    /// One bounding-box component, value is an `f32`.
    pub const BOUNDING_BOX: u32 = 0x61;
    /// Texture name pointer, value is an address or 0.
    pub const TEXTURE: u32 = 0x5E;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Root,
    Group,
    Special,
}

impl GroupKind {
    /// Type id stored in the compiled node record.
    pub const fn type_id(self) -> u32 {
        match self {
            GroupKind::Root => 7,
            GroupKind::Group => 5,
            GroupKind::Special => 10,
        }
    }

    pub const fn from_type_id(id: u32) -> Option<Self> {
        match id {
            7 => Some(GroupKind::Root),
            5 => Some(GroupKind::Group),
            10 => Some(GroupKind::Special),
            _ => None,
        }
    }
}

/// Type id of a model node record.
pub const MODEL_TYPE_ID: u32 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct GroupData {
    pub kind: GroupKind,
    pub transform: Option<TransformMatrix>,
    pub lights: LightSetId,
    /// Geometry drawn by the group list after its child calls.
    pub mesh: Option<Mesh>,
}

impl GroupData {
    pub fn new(kind: GroupKind, lights: LightSetId) -> Self {
        Self {
            kind,
            transform: None,
            lights,
            mesh: None,
        }
    }

    pub fn with_transform(mut self, transform: TransformMatrix) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// The group mesh, if it compiles to at least one command.
    pub fn drawn_mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref().filter(|m| {
            m.commands
                .iter()
                .any(|c| !matches!(c, DisplayCommand::Triangles(b) if b.is_empty()))
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelData {
    pub mesh: Mesh,
    /// Texture name, `None` for untextured models.
    pub texture: Option<String>,
}

impl ModelData {
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh, texture: None }
    }

    pub fn with_texture(mut self, name: impl Into<String>) -> Self {
        self.texture = Some(name.into());
        self
    }
}

/// What a tree node contains.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContent {
    /// A grouping node with an optional transform, a light set and optional geometry.
    Group(GroupData),
    /// A leaf with geometry.
    Model(ModelData),
}

impl NodeContent {
    pub fn type_id(&self) -> u32 {
        match self {
            NodeContent::Group(g) => g.kind.type_id(),
            NodeContent::Model(_) => MODEL_TYPE_ID,
        }
    }
}

/// A single node in the model tree.
#[derive(Clone, Debug)]
pub struct ShapeNode {
    pub id: ShapeNodeId,
    pub name: String,
    /// Extra properties, written after the ones the compiler derives.
    pub properties: Vec<Property>,
    pub parent: Option<ShapeNodeId>,
    pub children: Vec<ShapeNodeId>,
    pub content: NodeContent,
}

impl ShapeNode {
    pub fn new(id: ShapeNodeId, name: impl Into<String>, content: NodeContent) -> Self {
        Self {
            id,
            name: name.into(),
            properties: Vec::new(),
            parent: None,
            children: Vec::new(),
            content,
        }
    }

    pub fn as_group(&self) -> Option<&GroupData> {
        match &self.content {
            NodeContent::Group(g) => Some(g),
            NodeContent::Model(_) => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelData> {
        match &self.content {
            NodeContent::Model(m) => Some(m),
            NodeContent::Group(_) => None,
        }
    }
}
