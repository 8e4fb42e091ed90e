//! Model tree: the render-side hierarchy of groups and models.
//!
//! Nodes live in an arena indexed by [`ShapeNodeId`]. Children are ordered;
//! the parent link is kept for editing convenience and never serialized.
//! Light sets live next to the nodes and are referenced by id.

use crate::core::{Error, Mat4, Result};

use super::light::{LightSet, LightSetId};
use super::node::{GroupData, GroupKind, ModelData, NodeContent, ShapeNode, ShapeNodeId};

/// Arena-backed model tree with exactly one root group.
#[derive(Clone, Debug)]
pub struct ModelTree {
    nodes: Vec<ShapeNode>,
    root: ShapeNodeId,
    light_sets: Vec<LightSet>,
}

impl ModelTree {
    /// Create a tree holding only a root group that uses one default light set.
    pub fn new() -> Self {
        let lights = vec![LightSet::new("Default", [0xFF, 0xFF, 0xFF])];
        Self::with_root("Root", GroupData::new(GroupKind::Root, LightSetId(0)), lights)
    }

    /// Create a tree from an explicit root group and light-set list.
    pub fn with_root(name: impl Into<String>, root: GroupData, light_sets: Vec<LightSet>) -> Self {
        let root_id = ShapeNodeId(0);
        Self {
            nodes: vec![ShapeNode::new(root_id, name, NodeContent::Group(root))],
            root: root_id,
            light_sets,
        }
    }

    pub fn root(&self) -> ShapeNodeId {
        self.root
    }

    fn alloc(&mut self, parent: ShapeNodeId, name: String, content: NodeContent) -> Result<ShapeNodeId> {
        let parent_node = self
            .nodes
            .get(parent.0 as usize)
            .ok_or_else(|| Error::InvalidScene(format!("parent node {} does not exist", parent.0)))?;
        if parent_node.as_model().is_some() {
            return Err(Error::InvalidScene(format!(
                "model '{}' cannot have children",
                parent_node.name
            )));
        }

        let id = ShapeNodeId(self.nodes.len() as u32);
        let mut node = ShapeNode::new(id, name, content);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0 as usize].children.push(id);
        Ok(id)
    }

    /// Add a group under `parent`. Returns the new node's ID.
    pub fn add_group(
        &mut self,
        parent: ShapeNodeId,
        name: impl Into<String>,
        group: GroupData,
    ) -> Result<ShapeNodeId> {
        self.alloc(parent, name.into(), NodeContent::Group(group))
    }

    /// Add a model under `parent`. Returns the new node's ID.
    pub fn add_model(
        &mut self,
        parent: ShapeNodeId,
        name: impl Into<String>,
        model: ModelData,
    ) -> Result<ShapeNodeId> {
        self.alloc(parent, name.into(), NodeContent::Model(model))
    }

    pub fn add_light_set(&mut self, set: LightSet) -> LightSetId {
        self.light_sets.push(set);
        LightSetId(self.light_sets.len() as u32 - 1)
    }

    pub fn light_set(&self, id: LightSetId) -> Option<&LightSet> {
        self.light_sets.get(id.0 as usize)
    }

    pub fn light_sets(&self) -> &[LightSet] {
        &self.light_sets
    }

    pub fn get(&self, id: ShapeNodeId) -> Option<&ShapeNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ShapeNodeId) -> Option<&mut ShapeNode> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: ShapeNodeId) -> impl Iterator<Item = ShapeNodeId> + '_ {
        self.get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids with children before their parent, siblings in order.
    pub fn post_order(&self) -> Vec<ShapeNodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.children(id).collect::<Vec<_>>().into_iter().rev() {
                stack.push((child, false));
            }
        }
        out
    }

    /// Node ids with each parent before its children, siblings in order.
    pub fn pre_order(&self) -> Vec<ShapeNodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children(id).collect::<Vec<_>>().into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Transform from a node's local space to root space: the node's own
    /// group transform composed under every ancestor's, root outermost.
    pub fn world_transform(&self, id: ShapeNodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut m = Mat4::IDENTITY;
        loop {
            if let Some(t) = node.as_group().and_then(|g| g.transform) {
                m = t.to_mat4() * m;
            }
            match node.parent {
                Some(parent) => node = self.get(parent)?,
                None => return Some(m),
            }
        }
    }

    /// Models in post-order.
    pub fn models(&self) -> impl Iterator<Item = (&ShapeNode, &ModelData)> + '_ {
        self.post_order()
            .into_iter()
            .filter_map(move |id| self.get(id))
            .filter_map(|n| n.as_model().map(|m| (n, m)))
    }

    /// Check the invariants a compile relies on: light-set references resolve,
    /// models are leaves and exactly the root is a Root group.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            match &node.content {
                NodeContent::Group(g) => {
                    if self.light_set(g.lights).is_none() {
                        return Err(Error::MissingReference(format!(
                            "{} used by group '{}'",
                            g.lights, node.name
                        )));
                    }
                    if (g.kind == GroupKind::Root) != (node.id == self.root) {
                        return Err(Error::InvalidScene(format!(
                            "group '{}' has kind {:?}",
                            node.name, g.kind
                        )));
                    }
                }
                NodeContent::Model(_) if !node.children.is_empty() => {
                    return Err(Error::InvalidScene(format!(
                        "model '{}' cannot have children",
                        node.name
                    )));
                }
                NodeContent::Model(_) => {}
            }
        }
        Ok(())
    }
}

impl Default for ModelTree {
    fn default() -> Self {
        Self::new()
    }
}
