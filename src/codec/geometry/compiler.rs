//! Model tree to display-list geometry file.
//!
//! The file is written in one forward pass over tables that are filled
//! beforehand, then the header is patched with the root record and vertex
//! table addresses.

use std::collections::HashMap;

use log::{debug, info};

use crate::codec::config::CompileConfig;
use crate::codec::dedup::{IdentityTable, NameTable, ValueTable};
use crate::codec::gbi;
use crate::codec::stream::BinWriter;
use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::mesh::{batch_triangles, DisplayCommand, LoadPlan, Triangle, Vertex};
use crate::scene::node::property_key;
use crate::scene::{ModelTree, NodeContent, Property, ShapeNodeId, TransformMatrix};

/// Size of the file header.
pub const HEADER_SIZE: usize = 0x20;

// ---------------------------------------------------------------------------
// Texture names
// ---------------------------------------------------------------------------

/// Maps the texture names models use to the names written into the file.
pub trait TextureResolver {
    fn resolve(&self, name: &str) -> Result<String>;
}

/// Writes names unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughTextures;

impl TextureResolver for PassthroughTextures {
    fn resolve(&self, name: &str) -> Result<String> {
        Ok(name.to_owned())
    }
}

/// Old-style names: the first four characters of the texture archive name,
/// the texture name, then `tif`.
#[derive(Clone, Debug)]
pub struct LegacyTextureNames {
    pub prefix: String,
}

impl TextureResolver for LegacyTextureNames {
    fn resolve(&self, name: &str) -> Result<String> {
        if name.ends_with("tif") {
            return Ok(name.to_owned());
        }
        let prefix: String = self.prefix.chars().take(4).collect();
        Ok(format!("{}{}tif", prefix, name))
    }
}

/// Strict catalogue: every name must be listed.
impl TextureResolver for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Result<String> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::MissingReference(format!("texture '{}'", name)))
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Compile a model tree into a geometry file.
pub fn compile_geometry(
    tree: &ModelTree,
    textures: &dyn TextureResolver,
    config: &CompileConfig,
) -> Result<Vec<u8>> {
    tree.validate()?;
    GeometryCompiler::new(tree, config).compile(textures)
}

struct GeometryCompiler<'a> {
    tree: &'a ModelTree,
    config: &'a CompileConfig,
    post_order: Vec<ShapeNodeId>,
    bounds: HashMap<ShapeNodeId, Option<Aabb>>,

    vertices: ValueTable<Vertex>,
    matrices: ValueTable<TransformMatrix>,
    textures: NameTable,
    lights: IdentityTable,

    w: BinWriter,
    vertex_base: usize,
    texture_offsets: Vec<usize>,
    matrix_offsets: Vec<usize>,
    light_offsets: Vec<usize>,
    list_offsets: HashMap<ShapeNodeId, usize>,
    record_offsets: HashMap<ShapeNodeId, usize>,
}

impl<'a> GeometryCompiler<'a> {
    fn new(tree: &'a ModelTree, config: &'a CompileConfig) -> Self {
        Self {
            tree,
            config,
            post_order: tree.post_order(),
            bounds: HashMap::new(),
            vertices: ValueTable::new(),
            matrices: ValueTable::new(),
            textures: NameTable::default(),
            lights: IdentityTable::new(),
            w: BinWriter::new(),
            vertex_base: 0,
            texture_offsets: Vec::new(),
            matrix_offsets: Vec::new(),
            light_offsets: Vec::new(),
            list_offsets: HashMap::new(),
            record_offsets: HashMap::new(),
        }
    }

    fn ptr(&self, offset: usize) -> u32 {
        self.config.to_ptr(offset)
    }

    fn compile(mut self, textures: &dyn TextureResolver) -> Result<Vec<u8>> {
        self.build_tables();

        self.w.bytes(&[0; HEADER_SIZE])?;
        self.write_textures(textures)?;
        self.write_vertices()?;
        self.write_light_sets()?;
        self.write_matrices()?;
        for id in self.post_order.clone() {
            self.write_display_list(id)?;
        }
        self.w.align(16)?;
        for id in self.post_order.clone() {
            self.write_record(id)?;
        }

        let root = self.record_offsets[&self.tree.root()];
        let end = self.w.len();
        self.w.seek(0)?;
        self.w.u32(self.ptr(root))?;
        self.w.u32(self.ptr(self.vertex_base))?;
        self.w.seek(end)?;
        self.w.align(16)?;

        let bytes = self.w.into_inner();
        info!(
            "Compiled {} nodes: {} vertices, {} matrices, {} light sets, {} textures, 0x{:X} bytes",
            self.post_order.len(),
            self.vertices.len(),
            self.matrices.len(),
            self.lights.len(),
            self.textures.names().len(),
            bytes.len()
        );
        self.config.size_budget.check(bytes.len())?;
        Ok(bytes)
    }

    /// Fill every dedup table and the bounds in one pass each, in the order
    /// their entries are written.
    fn build_tables(&mut self) {
        for &id in &self.post_order {
            let Some(node) = self.tree.get(id) else { continue };
            let b = match &node.content {
                NodeContent::Model(model) => {
                    if let Some(name) = &model.texture {
                        self.textures.insert(name);
                    }
                    for v in model.mesh.vertices() {
                        self.vertices.insert(*v);
                    }
                    model.mesh.bounds()
                }
                NodeContent::Group(group) => {
                    let own = group.drawn_mesh().and_then(|mesh| {
                        for v in mesh.vertices() {
                            self.vertices.insert(*v);
                        }
                        mesh.bounds()
                    });
                    node.children
                        .iter()
                        .fold(own, |acc, c| Aabb::union(acc, self.bounds.get(c).copied().flatten()))
                }
            };
            self.bounds.insert(id, b);
        }

        for id in self.tree.pre_order() {
            if let Some(group) = self.tree.get(id).and_then(|n| n.as_group()) {
                if let Some(m) = group.transform {
                    self.matrices.insert(m);
                }
                self.lights.insert(group.lights);
            }
        }
    }

    fn write_textures(&mut self, textures: &dyn TextureResolver) -> Result<()> {
        for name in self.textures.names() {
            let stored = textures.resolve(name)?;
            self.texture_offsets.push(self.w.pos());
            self.w.bytes(stored.as_bytes())?;
            self.w.u8(0)?;
            self.w.align(4)?;
        }
        self.w.align(16)
    }

    fn write_vertices(&mut self) -> Result<()> {
        self.vertex_base = self.w.pos();
        for v in self.vertices.values() {
            for p in v.position {
                self.w.i16(p)?;
            }
            self.w.u16(0)?;
            self.w.i16(v.uv[0])?;
            self.w.i16(v.uv[1])?;
            self.w.bytes(&v.color)?;
        }
        self.w.align(16)
    }

    fn write_light_sets(&mut self) -> Result<()> {
        for id in self.lights.values() {
            let set = self
                .tree
                .light_set(*id)
                .ok_or_else(|| Error::MissingReference(id.to_string()))?;
            self.light_offsets.push(self.w.pos());
            for word in set.packed() {
                self.w.u32(word)?;
            }
        }
        Ok(())
    }

    fn write_matrices(&mut self) -> Result<()> {
        for m in self.matrices.values() {
            self.matrix_offsets.push(self.w.pos());
            for half in m.to_halves() {
                self.w.u16(half)?;
            }
        }
        Ok(())
    }

    fn matrix_ptr(&self, m: &TransformMatrix) -> u32 {
        self.matrices
            .get(m)
            .map(|i| self.ptr(self.matrix_offsets[i]))
            .unwrap_or(0)
    }

    fn write_display_list(&mut self, id: ShapeNodeId) -> Result<()> {
        let tree = self.tree;
        let Some(node) = tree.get(id) else { return Ok(()) };
        self.list_offsets.insert(id, self.w.pos());

        let transform = node.as_group().and_then(|g| g.transform);
        if let Some(m) = &transform {
            self.w.words(gbi::matrix(self.matrix_ptr(m)))?;
        }

        for child in &node.children {
            let ptr = self.ptr(self.list_offsets[child]);
            self.w.words(gbi::call_list(ptr))?;
        }

        let mesh = match &node.content {
            NodeContent::Model(model) => Some(&model.mesh),
            NodeContent::Group(group) => group.drawn_mesh(),
        };
        if let Some(mesh) = mesh {
            for cmd in mesh.coalesced() {
                match &cmd {
                    DisplayCommand::Triangles(batch) => self.write_triangles(&batch.triangles)?,
                    other => {
                        if let Some(words) = gbi::encode_display_command(other) {
                            self.w.words(words)?;
                        }
                    }
                }
            }
            self.w.words(gbi::END_DL)?;
        }

        if transform.is_some() {
            self.w.words(gbi::POP_MATRIX)?;
        }
        self.w.words(gbi::END_DL)
    }

    fn write_triangles(&mut self, triangles: &[Triangle]) -> Result<()> {
        for batch in batch_triangles(triangles) {
            if batch.vertices.iter().any(|v| self.vertices.get(v).is_none()) {
                return Err(Error::InvalidScene("vertex missing from vertex table".into()));
            }
            let plan = LoadPlan::new(
                &batch,
                |v| self.vertices.get(v).unwrap_or_default(),
                self.vertices.values(),
            );

            let mut loaded = 0;
            for run in &plan.runs {
                let count = run.end() - run.start() + 1;
                loaded += count;
                let addr = self.ptr(self.vertex_base + Vertex::COMPILED_SIZE * run.start());
                self.w.words(gbi::load_vertices(count, loaded, addr))?;
            }

            let slots = |t: &Triangle| t.vertices.map(|v| plan.slot(&v));
            for pair in batch.triangles.chunks(2) {
                let words = match pair {
                    [a, b] => gbi::tri2(slots(a), slots(b)),
                    [a] => gbi::tri1(slots(a)),
                    _ => continue,
                };
                self.w.words(words)?;
            }
        }
        Ok(())
    }

    fn write_properties(&mut self, id: ShapeNodeId, extra: &[Property]) -> Result<u32> {
        let corners = Aabb::corners(self.bounds.get(&id).copied().flatten());
        for c in corners {
            self.w.u32(property_key::BOUNDING_BOX)?;
            self.w.u32(1)?;
            self.w.f32(c)?;
        }
        for p in extra {
            self.w.u32(p.key)?;
            self.w.u32(p.kind)?;
            self.w.u32(p.value)?;
        }
        Ok(corners.len() as u32 + extra.len() as u32)
    }

    fn write_record(&mut self, id: ShapeNodeId) -> Result<()> {
        let tree = self.tree;
        let Some(node) = tree.get(id) else { return Ok(()) };
        let list_ptr = self.ptr(self.list_offsets[&id]);

        match &node.content {
            NodeContent::Model(model) => {
                let props = self.w.pos();
                let texture = match &model.texture {
                    Some(name) => self
                        .textures
                        .get(name)
                        .map(|i| self.ptr(self.texture_offsets[i]))
                        .unwrap_or(0),
                    None => 0,
                };
                let mut n = self.write_properties(id, &[])?;
                self.w.u32(property_key::TEXTURE)?;
                self.w.u32(2)?;
                self.w.u32(texture)?;
                n += 1;
                for p in &node.properties {
                    self.w.u32(p.key)?;
                    self.w.u32(p.kind)?;
                    self.w.u32(p.value)?;
                }
                n += node.properties.len() as u32;

                let display = self.w.pos();
                self.w.words([list_ptr, 0])?;

                let record = self.w.pos();
                self.w.u32(node.content.type_id())?;
                self.w.u32(self.ptr(display))?;
                self.w.u32(n)?;
                self.w.u32(self.ptr(props))?;
                self.w.u32(0)?;
                self.record_offsets.insert(id, record);
            }
            NodeContent::Group(group) => {
                let props = self.w.pos();
                let n = self.write_properties(id, &node.properties)?;

                let children = self.w.pos();
                for child in &node.children {
                    let ptr = self.ptr(self.record_offsets[child]);
                    self.w.u32(ptr)?;
                }

                let light_index = self
                    .lights
                    .get(&group.lights)
                    .ok_or_else(|| Error::MissingReference(group.lights.to_string()))?;
                let light_count = tree
                    .light_set(group.lights)
                    .map(|s| s.lights.len())
                    .unwrap_or(0);

                let group_data = self.w.pos();
                let matrix = group.transform.map(|m| self.matrix_ptr(&m)).unwrap_or(0);
                self.w.u32(matrix)?;
                self.w.u32(self.ptr(self.light_offsets[light_index]))?;
                self.w.u32(light_count as u32)?;
                self.w.u32(node.children.len() as u32)?;
                self.w.u32(self.ptr(children))?;

                let display = self.w.pos();
                self.w.words([list_ptr, 0])?;

                let record = self.w.pos();
                self.w.u32(node.content.type_id())?;
                self.w.u32(self.ptr(display))?;
                self.w.u32(n)?;
                self.w.u32(self.ptr(props))?;
                self.w.u32(self.ptr(group_data))?;
                self.record_offsets.insert(id, record);
            }
        }

        debug!("Wrote {} to {:08X}", node.name, self.record_offsets[&id]);
        Ok(())
    }
}
