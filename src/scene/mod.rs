//! Render-side scene model: groups, models, transforms and light sets

pub mod graph;
pub mod light;
pub mod node;
pub mod transform;

pub use graph::ModelTree;
pub use light::{Light, LightSet, LightSetId};
pub use node::{
    GroupData, GroupKind, ModelData, NodeContent, Property, ShapeNode, ShapeNodeId,
    MODEL_TYPE_ID,
};
pub use transform::TransformMatrix;
