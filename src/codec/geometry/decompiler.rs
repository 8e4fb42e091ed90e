//! Geometry file back to a model tree.
//!
//! Node records are resolved with an explicit work stack, light sets are read
//! once the whole tree is known, and each display list is replayed through
//! the shared opcode table to recover triangle batches. Group lists may draw
//! after their child calls; that geometry becomes the group mesh.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info};

use crate::codec::config::CompileConfig;
use crate::codec::gbi::{Command, CommandReader, Opcode, VertexWindow};
use crate::codec::names::read_name_tables;
use crate::codec::report::{Decompiled, Warnings};
use crate::codec::stream::BinReader;
use crate::core::{Error, Result};
use crate::mesh::{DisplayCommand, Mesh, Triangle, TriangleBatch, Vertex};
use crate::scene::light::unpack_rgb;
use crate::scene::node::property_key;
use crate::scene::{
    GroupData, GroupKind, Light, LightSet, LightSetId, ModelData, ModelTree, Property,
    ShapeNodeId, TransformMatrix, MODEL_TYPE_ID,
};

/// Deepest chain of display list calls followed.
pub const MAX_LIST_DEPTH: usize = 32;

/// Commands interpreted per list before it is declared non-terminating.
const MAX_COMMANDS: usize = 1 << 20;

/// Decompile a geometry file into a model tree.
pub fn decompile_geometry(bytes: &[u8], config: &CompileConfig) -> Result<Decompiled<ModelTree>> {
    GeometryDecompiler::new(bytes, config).run()
}

enum RawContent {
    Model {
        texture: Option<String>,
    },
    Group {
        kind: GroupKind,
        matrix: Option<usize>,
        light_ptr: u32,
        light_count: u32,
        children: usize,
    },
}

/// A node record as stored, before the tree is assembled.
struct RawNode {
    offset: usize,
    parent: Option<usize>,
    list: usize,
    properties: Vec<Property>,
    content: RawContent,
}

struct GeometryDecompiler<'a> {
    bytes: &'a [u8],
    config: &'a CompileConfig,
    r: BinReader<'a>,
    warnings: Warnings,
}

impl<'a> GeometryDecompiler<'a> {
    fn new(bytes: &'a [u8], config: &'a CompileConfig) -> Self {
        Self {
            bytes,
            config,
            r: BinReader::new(bytes),
            warnings: Warnings::default(),
        }
    }

    fn offset(&self, ptr: u32, at: usize) -> Result<usize> {
        if ptr == 0 {
            return Err(Error::corrupt(at, "null pointer"));
        }
        let off = self.config.to_offset(ptr, at)?;
        if off >= self.bytes.len() {
            return Err(Error::corrupt(at, format!("pointer {:08X} outside the file", ptr)));
        }
        Ok(off)
    }

    fn run(mut self) -> Result<Decompiled<ModelTree>> {
        let root_ptr = self.r.u32_at(0)?;
        let root_offset = self.offset(root_ptr, 0)?;
        let raws = self.read_records(root_offset)?;
        let (light_sets, light_ids) = self.read_light_sets(&raws)?;
        let names = read_name_tables(self.bytes, self.config)?.models;

        // Names are listed in post-order with the root left out.
        let mut name_of: Vec<Option<String>> = vec![None; raws.len()];
        for (slot, name) in post_order(&raws).into_iter().filter(|&i| i != 0).zip(names) {
            name_of[slot] = Some(name);
        }

        let root = &raws[0];
        let mut root_group = match &root.content {
            RawContent::Group { kind: GroupKind::Root, .. } => self.group_data(root, &light_ids)?,
            _ => return Err(Error::corrupt(root.offset, "root record is not a root group")),
        };
        root_group.mesh = self.read_group_list(root)?;

        let mut tree = ModelTree::with_root("Root", root_group, light_sets);
        let mut ids: Vec<ShapeNodeId> = vec![tree.root()];
        if let Some(node) = tree.get_mut(tree.root()) {
            node.properties = root.properties.clone();
        }

        for (i, raw) in raws.iter().enumerate().skip(1) {
            let parent = ids[raw.parent.unwrap_or(0)];
            let name = name_of[i].take().unwrap_or_else(|| default_name(raw));
            let id = match &raw.content {
                RawContent::Model { texture } => {
                    let mesh = self.read_mesh(raw.list)?;
                    let mut model = ModelData::new(mesh);
                    model.texture = texture.clone();
                    tree.add_model(parent, name, model)?
                }
                RawContent::Group { kind: GroupKind::Root, .. } => {
                    return Err(Error::corrupt(raw.offset, "second root record"));
                }
                RawContent::Group { .. } => {
                    let mut group = self.group_data(raw, &light_ids)?;
                    group.mesh = self.read_group_list(raw)?;
                    tree.add_group(parent, name, group)?
                }
            };
            if let Some(node) = tree.get_mut(id) {
                node.properties = raw.properties.clone();
            }
            ids.push(id);
        }

        info!(
            "Decompiled {} nodes, {} light sets ({} warnings)",
            tree.node_count(),
            tree.light_sets().len(),
            self.warnings.len()
        );
        Ok(self.warnings.finish(tree))
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Every node record reachable from the root, in pre-order.
    fn read_records(&mut self, root: usize) -> Result<Vec<RawNode>> {
        let mut raws = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(usize, Option<usize>)> = vec![(root, None)];

        while let Some((offset, parent)) = stack.pop() {
            if !visited.insert(offset) {
                return Err(Error::corrupt(offset, "node record referenced twice"));
            }
            let (raw, children) = self.read_record(offset, parent)?;
            debug!("Read record {:08X} with {} children", offset, children.len());
            let index = raws.len();
            raws.push(raw);
            for child in children.into_iter().rev() {
                stack.push((child, Some(index)));
            }
        }
        Ok(raws)
    }

    fn read_record(&mut self, offset: usize, parent: Option<usize>) -> Result<(RawNode, Vec<usize>)> {
        self.r.seek(offset)?;
        let type_id = self.r.u32()?;
        let display_ptr = self.r.u32()?;
        let num_props = self.r.u32()? as usize;
        let props_ptr = self.r.u32()?;
        let group_ptr = self.r.u32()?;

        let display = self.offset(display_ptr, offset + 4)?;
        let list_ptr = self.r.u32_at(display)?;
        if self.r.u32()? != 0 {
            return Err(Error::corrupt(display + 4, "non-zero padding after display list pointer"));
        }
        let list = self.offset(list_ptr, display)?;

        let is_model = type_id == MODEL_TYPE_ID;
        let group_kind = GroupKind::from_type_id(type_id);
        if !is_model && group_kind.is_none() {
            return Err(Error::corrupt(offset, format!("unknown node type {}", type_id)));
        }

        let mut props = Vec::new();
        if num_props > 0 {
            let at = self.offset(props_ptr, offset + 12)?;
            self.r.ensure_table(at, num_props, 12)?;
            props.reserve(num_props);
            self.r.seek(at)?;
            for _ in 0..num_props {
                props.push(Property::new(self.r.u32()?, self.r.u32()?, self.r.u32()?));
            }
        }

        let mut extras = Vec::new();
        let mut texture_ptr = None;
        for (i, p) in props.into_iter().enumerate() {
            if i < 6 && p.key == property_key::BOUNDING_BOX {
                continue;
            }
            if is_model && texture_ptr.is_none() && p.key == property_key::TEXTURE {
                texture_ptr = Some(p.value);
                continue;
            }
            extras.push(p);
        }

        if is_model {
            if group_ptr != 0 {
                return Err(Error::corrupt(offset + 16, "model record has group data"));
            }
            let texture = match texture_ptr {
                Some(ptr) if ptr != 0 => {
                    let at = self.offset(ptr, offset)?;
                    self.r.seek(at)?;
                    Some(self.r.c_string()?)
                }
                _ => None,
            };
            let raw = RawNode {
                offset,
                parent,
                list,
                properties: extras,
                content: RawContent::Model { texture },
            };
            return Ok((raw, Vec::new()));
        }

        let data = self.offset(group_ptr, offset + 16)?;
        self.r.seek(data)?;
        let matrix_ptr = self.r.u32()?;
        let light_ptr = self.r.u32()?;
        let light_count = self.r.u32()?;
        let num_children = self.r.u32()? as usize;
        let children_ptr = self.r.u32()?;

        let matrix = match matrix_ptr {
            0 => None,
            ptr => Some(self.offset(ptr, data)?),
        };

        let mut children = Vec::new();
        if num_children > 0 {
            let mut at = self.offset(children_ptr, data + 16)?;
            self.r.ensure_table(at, num_children, 4)?;
            children.reserve(num_children);
            for _ in 0..num_children {
                let ptr = self.r.u32_at(at)?;
                children.push(self.offset(ptr, at)?);
                at += 4;
            }
        }

        let raw = RawNode {
            offset,
            parent,
            list,
            properties: extras,
            content: RawContent::Group {
                kind: group_kind.unwrap_or(GroupKind::Group),
                matrix,
                light_ptr,
                light_count,
                children: num_children,
            },
        };
        Ok((raw, children))
    }

    fn group_data(&mut self, raw: &RawNode, light_ids: &HashMap<u32, LightSetId>) -> Result<GroupData> {
        let RawContent::Group { kind, matrix, light_ptr, .. } = &raw.content else {
            return Err(Error::corrupt(raw.offset, "expected a group record"));
        };
        let lights = light_ids
            .get(light_ptr)
            .copied()
            .ok_or_else(|| Error::corrupt(raw.offset, format!("invalid light set pointer {:08X}", light_ptr)))?;
        let mut group = GroupData::new(*kind, lights);
        if let Some(at) = matrix {
            self.r.seek(*at)?;
            let mut halves = [0u16; 32];
            for h in halves.iter_mut() {
                *h = self.r.u16()?;
            }
            group.transform = Some(TransformMatrix::from_halves(&halves));
        }
        Ok(group)
    }

    // -----------------------------------------------------------------------
    // Light sets
    // -----------------------------------------------------------------------

    /// One light set per distinct address, in address order.
    fn read_light_sets(&mut self, raws: &[RawNode]) -> Result<(Vec<LightSet>, HashMap<u32, LightSetId>)> {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for raw in raws {
            if let RawContent::Group { light_ptr, light_count, .. } = raw.content {
                let known = *counts.entry(light_ptr).or_insert(light_count);
                if known != light_count {
                    self.warnings.push(
                        raw.offset,
                        format!(
                            "light set {:08X} used with {} and {} lights, keeping {}",
                            light_ptr, known, light_count, known
                        ),
                    );
                }
            }
        }

        let mut sets = Vec::with_capacity(counts.len());
        let mut ids = HashMap::with_capacity(counts.len());
        for (ptr, count) in counts {
            let at = self.offset(ptr, 0)?;
            self.r.seek(at)?;
            let ambient = unpack_rgb(self.r.u32()?);
            self.r.u32()?;
            let mut set = LightSet::new(format!("Lights_{:08X}", ptr), ambient);
            for _ in 0..count {
                let color = self.r.u32()?;
                self.r.u32()?;
                let direction = self.r.u32()?;
                self.r.u32()?;
                set.lights.push(Light::from_packed(color, direction));
            }
            ids.insert(ptr, LightSetId(sets.len() as u32));
            sets.push(set);
        }
        Ok((sets, ids))
    }

    // -----------------------------------------------------------------------
    // Display lists
    // -----------------------------------------------------------------------

    /// Group lists call their children, then may draw geometry of their own.
    /// The group mesh starts at the first command that is not a child call
    /// or a matrix push or pop.
    fn read_group_list(&mut self, raw: &RawNode) -> Result<Option<Mesh>> {
        let RawContent::Group { children, .. } = raw.content else {
            return Ok(None);
        };
        let mut cmds = CommandReader::new(&mut self.r, raw.list)?;
        let mut calls = 0;
        let mut mesh_start = None;
        for _ in 0..MAX_COMMANDS {
            let decoded = match cmds.next_command() {
                Ok(d) => d,
                Err(Error::UnknownOpcode { offset, .. }) => {
                    mesh_start = Some(offset);
                    break;
                }
                Err(e) => return Err(e),
            };
            match decoded.command {
                Command::End => break,
                Command::List { .. } => calls += 1,
                Command::Matrix { .. } | Command::PopMatrix { .. } => {}
                _ => {
                    mesh_start = Some(decoded.offset);
                    break;
                }
            }
        }
        if calls != children {
            self.warnings.push(
                raw.list,
                format!("group list calls {} lists but the group has {} children", calls, children),
            );
        }
        mesh_start.map(|at| self.read_mesh(at)).transpose()
    }

    /// Replay a model's display list into mesh commands.
    fn read_mesh(&mut self, start: usize) -> Result<Mesh> {
        let config = self.config;
        let len = self.bytes.len();
        let warnings = &mut self.warnings;
        let mut cmds = CommandReader::new(&mut self.r, start)?;

        let mut mesh = Mesh::default();
        let mut batch: Vec<Triangle> = Vec::new();
        let mut window = VertexWindow::default();
        let mut cache: HashMap<u32, Vertex> = HashMap::new();
        let mut returns: Vec<usize> = Vec::new();
        let mut drawn = false;

        let flush = |mesh: &mut Mesh, batch: &mut Vec<Triangle>| {
            if !batch.is_empty() {
                mesh.push(DisplayCommand::Triangles(TriangleBatch::new(std::mem::take(batch))));
            }
        };

        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_COMMANDS {
                return Err(Error::corrupt(start, "display list does not terminate"));
            }

            let decoded = match cmds.next_command() {
                Ok(d) => d,
                Err(Error::UnknownOpcode { opcode, offset }) => {
                    warnings.push(offset, format!("unknown opcode {:02X}, rest of list skipped", opcode));
                    match returns.pop() {
                        Some(back) => {
                            cmds.jump(back)?;
                            continue;
                        }
                        None => break,
                    }
                }
                Err(e) => return Err(e),
            };
            let at = decoded.offset;

            let mut vertex = |cmds: &mut CommandReader<'_, '_>, slot: usize| -> Result<Vertex> {
                let addr = window.resolve(slot, at)?;
                if let Some(v) = cache.get(&addr) {
                    return Ok(*v);
                }
                let off = config.to_offset(addr, at)?;
                if off + Vertex::COMPILED_SIZE > len {
                    return Err(Error::corrupt(at, format!("vertex {:08X} outside the file", addr)));
                }
                let v = cmds.vertex_at(off)?;
                cache.insert(addr, v);
                Ok(v)
            };

            match decoded.command {
                Command::LoadVertices { count, end, addr } => window.load(count, end, addr, at)?,
                Command::Tri1(s) => {
                    let t = Triangle::new(vertex(&mut cmds, s[0])?, vertex(&mut cmds, s[1])?, vertex(&mut cmds, s[2])?);
                    batch.push(t);
                    drawn = true;
                }
                Command::Tri2(a, b) => {
                    for s in [a, b] {
                        let t = Triangle::new(vertex(&mut cmds, s[0])?, vertex(&mut cmds, s[1])?, vertex(&mut cmds, s[2])?);
                        batch.push(t);
                    }
                    drawn = true;
                }
                Command::PipeSync => {
                    flush(&mut mesh, &mut batch);
                    mesh.push(DisplayCommand::PipeSync);
                }
                Command::GeometryMode { clear, set } => {
                    flush(&mut mesh, &mut batch);
                    mesh.push(DisplayCommand::GeometryMode { clear, set });
                }
                Command::Matrix { .. } | Command::PopMatrix { .. } => {
                    flush(&mut mesh, &mut batch);
                    mesh.push(DisplayCommand::Raw([decoded.words[0], decoded.words[1]]));
                    drawn = false;
                }
                Command::List { addr, push } => {
                    if drawn {
                        warnings.push(
                            at,
                            format!("triangles drawn before call to {:08X} without a texture or matrix reset", addr),
                        );
                        drawn = false;
                    }
                    if push && returns.len() >= MAX_LIST_DEPTH {
                        warnings.push(at, format!("list nesting deeper than {}, call skipped", MAX_LIST_DEPTH));
                        continue;
                    }
                    let target = config.to_offset(addr, at)?;
                    if push {
                        returns.push(cmds.pos());
                    }
                    cmds.jump(target)?;
                }
                Command::End => match returns.pop() {
                    Some(back) => cmds.jump(back)?,
                    None => break,
                },
                Command::Other { opcode, ref words } if words.len() == 2 => {
                    flush(&mut mesh, &mut batch);
                    mesh.push(DisplayCommand::Raw([words[0], words[1]]));
                    if opcode == Opcode::Texture {
                        drawn = false;
                    }
                }
                Command::Other { opcode, ref words } => {
                    warnings.push(
                        at,
                        format!("{:?} takes {} words and cannot be kept in a mesh, rest of list skipped", opcode, words.len()),
                    );
                    match returns.pop() {
                        Some(back) => cmds.jump(back)?,
                        None => break,
                    }
                }
            }
        }

        flush(&mut mesh, &mut batch);
        Ok(mesh)
    }
}

/// Indices of `raws` (stored in pre-order) rearranged into post-order.
fn post_order(raws: &[RawNode]) -> Vec<usize> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); raws.len()];
    for (i, raw) in raws.iter().enumerate() {
        if let Some(p) = raw.parent {
            children[p].push(i);
        }
    }
    let mut out = Vec::with_capacity(raws.len());
    let mut stack = vec![(0usize, false)];
    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            out.push(i);
            continue;
        }
        stack.push((i, true));
        stack.extend(children[i].iter().rev().map(|&c| (c, false)));
    }
    out
}

fn default_name(raw: &RawNode) -> String {
    match raw.content {
        RawContent::Model { .. } => format!("Model {:08X}", raw.offset),
        RawContent::Group { kind: GroupKind::Root, .. } => "Root".to_owned(),
        RawContent::Group { .. } => format!("Group {:08X}", raw.offset),
    }
}
