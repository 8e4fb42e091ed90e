//! World-space triangles from a compiled geometry file.
//!
//! Replays the display lists the way the console would: calls nest, matrices
//! stack up, and vertices are transformed when they are loaded.

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use log::info;

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::mesh::{Vertex, VERTEX_BUFFER_SIZE};
use crate::scene::TransformMatrix;

use super::config::CompileConfig;
use super::gbi::{Command, CommandReader, VertexWindow};
use super::geometry::MAX_LIST_DEPTH;
use super::report::{Decompiled, Warnings};
use super::stream::BinReader;

/// Commands interpreted before the lists are declared non-terminating.
const MAX_COMMANDS: usize = 1 << 22;

/// Every triangle a geometry file draws, in world space and draw order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticGeometry {
    pub triangles: Vec<[Vec3; 3]>,
}

impl StaticGeometry {
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.triangles.iter().flatten().copied())
    }
}

/// Walk the geometry file's display lists from the root node.
pub fn extract_static_geometry(bytes: &[u8], config: &CompileConfig) -> Result<Decompiled<StaticGeometry>> {
    let mut r = BinReader::new(bytes);
    let root_record = config.to_offset(r.u32_at(0)?, 0)?;
    let display = config.to_offset(r.u32_at(root_record + 4)?, root_record + 4)?;
    let root_list = config.to_offset(r.u32_at(display)?, display)?;

    let mut warnings = Warnings::default();
    let geometry = Extractor::new(config).run(&mut r, root_list, &mut warnings)?;
    info!("Extracted {} triangles ({} warnings)", geometry.triangles.len(), warnings.len());
    Ok(warnings.finish(geometry))
}

struct Extractor<'a> {
    config: &'a CompileConfig,
    matrices: Vec<Mat4>,
    window: VertexWindow,
    loaded: [Vec3; VERTEX_BUFFER_SIZE],
    cache: HashMap<u32, Vertex>,
    out: StaticGeometry,
}

impl<'a> Extractor<'a> {
    fn new(config: &'a CompileConfig) -> Self {
        Self {
            config,
            matrices: vec![Mat4::IDENTITY],
            window: VertexWindow::default(),
            loaded: [Vec3::ZERO; VERTEX_BUFFER_SIZE],
            cache: HashMap::new(),
            out: StaticGeometry::default(),
        }
    }

    fn top(&self) -> Mat4 {
        self.matrices.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    fn run(mut self, r: &mut BinReader<'_>, start: usize, warnings: &mut Warnings) -> Result<StaticGeometry> {
        let mut cmds = CommandReader::new(r, start)?;
        let mut returns: Vec<usize> = Vec::new();

        for _ in 0..MAX_COMMANDS {
            let decoded = match cmds.next_command() {
                Ok(d) => d,
                Err(Error::UnknownOpcode { opcode, offset }) => {
                    warnings.push(offset, format!("unknown opcode {:02X}, rest of list skipped", opcode));
                    match returns.pop() {
                        Some(back) => {
                            cmds.jump(back)?;
                            continue;
                        }
                        None => return Ok(self.out),
                    }
                }
                Err(e) => return Err(e),
            };
            let at = decoded.offset;

            match decoded.command {
                Command::List { addr, push } => {
                    if push && returns.len() >= MAX_LIST_DEPTH {
                        warnings.push(at, format!("list nesting deeper than {}, call skipped", MAX_LIST_DEPTH));
                        continue;
                    }
                    let target = self.config.to_offset(addr, at)?;
                    if push {
                        returns.push(cmds.pos());
                    }
                    cmds.jump(target)?;
                }
                Command::End => match returns.pop() {
                    Some(back) => cmds.jump(back)?,
                    None => return Ok(self.out),
                },
                Command::Matrix { addr } => {
                    let m = cmds.matrix_at(self.config.to_offset(addr, at)?)?.to_mat4();
                    let top = self.top();
                    self.matrices.push(top * m);
                }
                Command::PopMatrix { bytes } => {
                    for _ in 0..bytes / TransformMatrix::COMPILED_SIZE as u32 {
                        if self.matrices.len() > 1 {
                            self.matrices.pop();
                        }
                    }
                }
                Command::LoadVertices { count, end, addr } => {
                    self.window.load(count, end, addr, at)?;
                    let top = self.top();
                    for slot in end - count..end {
                        let addr = self.window.resolve(slot, at)?;
                        let v = match self.cache.get(&addr) {
                            Some(v) => *v,
                            None => {
                                let v = cmds.vertex_at(self.config.to_offset(addr, at)?)?;
                                self.cache.insert(addr, v);
                                v
                            }
                        };
                        self.loaded[slot] = top.transform_point3(v.position_vec3());
                    }
                }
                Command::Tri1(s) => self.emit(s, at)?,
                Command::Tri2(a, b) => {
                    self.emit(a, at)?;
                    self.emit(b, at)?;
                }
                _ => {}
            }
        }
        Err(Error::corrupt(start, "display lists do not terminate"))
    }

    fn emit(&mut self, slots: [usize; 3], at: usize) -> Result<()> {
        let mut tri = [Vec3::ZERO; 3];
        for (k, &s) in slots.iter().enumerate() {
            self.window.resolve(s, at)?;
            tri[k] = self.loaded[s];
        }
        self.out.triangles.push(tri);
        Ok(())
    }
}
