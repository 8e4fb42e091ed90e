//! End-to-end tests across compilers, decompilers and the extractor.

use glam::Vec3;

use crate::codec::gbi::{Command, CommandReader};
use crate::codec::stream::BinReader;
use crate::codec::*;
use crate::core::Error;
use crate::hit::{CameraControl, HitObject, HitTree};
use crate::mesh::{DisplayCommand, Mesh, Triangle, Vertex};
use crate::scene::{
    GroupData, GroupKind, Light, LightSet, LightSetId, ModelData, ModelTree, Property,
    TransformMatrix,
};

fn v(x: i16, y: i16, z: i16) -> Vertex {
    Vertex::at(x, y, z)
}

fn tri(x: i16) -> Triangle {
    Triangle::new(v(x, 0, 0), v(x + 10, 0, 0), v(x, 0, 10))
}

fn group(lights: LightSetId) -> GroupData {
    GroupData::new(GroupKind::Group, lights)
}

/// Display-list offsets of every model, in post-order.
fn model_lists(bytes: &[u8], config: &CompileConfig) -> Vec<usize> {
    let mut r = BinReader::new(bytes);
    let mut out = Vec::new();
    let mut stack = vec![config.to_offset(r.u32_at(0).unwrap(), 0).unwrap()];
    while let Some(record) = stack.pop() {
        let type_id = r.u32_at(record).unwrap();
        let display = config.to_offset(r.u32().unwrap(), record).unwrap();
        r.u32().unwrap();
        r.u32().unwrap();
        let group_data = r.u32().unwrap();
        if type_id == 2 {
            out.push(config.to_offset(r.u32_at(display).unwrap(), display).unwrap());
            continue;
        }
        let data = config.to_offset(group_data, record).unwrap();
        let count = r.u32_at(data + 12).unwrap() as usize;
        let children = config.to_offset(r.u32().unwrap(), data).unwrap();
        for k in (0..count).rev() {
            let child = r.u32_at(children + 4 * k).unwrap();
            stack.push(config.to_offset(child, children).unwrap());
        }
    }
    out
}

/// Every vertex-load command in one model list.
fn vertex_loads(bytes: &[u8], list: usize) -> Vec<(usize, u32)> {
    let mut r = BinReader::new(bytes);
    let mut cmds = CommandReader::new(&mut r, list).unwrap();
    let mut loads = Vec::new();
    loop {
        match cmds.next_command().unwrap().command {
            Command::LoadVertices { count, addr, .. } => loads.push((count, addr)),
            Command::End => return loads,
            _ => {}
        }
    }
}

/// Root with default lights, a transformed group with its own lights, a
/// textured model inside it and a model with extra commands beside it.
fn sample_tree() -> ModelTree {
    let mut tree = ModelTree::new();
    let lamp = tree.add_light_set(
        LightSet::new("Lamp", [0x40, 0x40, 0x40]).with_light(Light {
            color: [0xFF, 0xE0, 0xC0],
            direction: [0, -127, 0],
        }),
    );
    let root = tree.root();

    let house = tree
        .add_group(root, "House", group(lamp).with_transform(TransformMatrix::from_translation(100.0, 0.0, -50.0)))
        .unwrap();
    let wall = Mesh::from_triangles(vec![tri(0), tri(20)]);
    tree.add_model(house, "Wall", ModelData::new(wall).with_texture("kmr_wall"))
        .unwrap();

    let mut floor = Mesh::default();
    floor.push(DisplayCommand::PipeSync);
    floor.push(DisplayCommand::GeometryMode { clear: 0x0000_0400, set: 0x0020_0000 });
    floor.push(DisplayCommand::Triangles(crate::mesh::TriangleBatch::new(vec![tri(0), tri(40)])));
    let floor_id = tree.add_model(root, "Floor", ModelData::new(floor)).unwrap();
    tree.get_mut(floor_id)
        .unwrap()
        .properties
        .push(Property::new(0x62, 0, 0x0000_8000));
    tree
}

/// Offset of the root node record.
fn root_record(bytes: &[u8], config: &CompileConfig) -> usize {
    config.to_offset(BinReader::new(bytes).u32_at(0).unwrap(), 0).unwrap()
}

fn patch_word(bytes: &mut [u8], at: usize, word: u32) {
    bytes[at..at + 4].copy_from_slice(&word.to_be_bytes());
}

#[test]
fn test_shared_quad_group_uses_one_vertex_table() {
    let (a, b, c, d) = (v(0, 0, 0), v(100, 0, 0), v(100, 0, 100), v(0, 0, 100));
    let quad = || Mesh::from_triangles(vec![Triangle::new(a, b, c), Triangle::new(a, c, d)]);

    let mut tree = ModelTree::new();
    let root = tree.root();
    let g = tree.add_group(root, "Tiles", group(LightSetId(0))).unwrap();
    tree.add_model(g, "Left", ModelData::new(quad()).with_texture("kmr_tile"))
        .unwrap();
    tree.add_model(g, "Right", ModelData::new(quad()).with_texture("kmr_tile"))
        .unwrap();

    let config = CompileConfig::default();
    let bytes = compile_geometry(&tree, &PassthroughTextures, &config).unwrap();
    let mut r = BinReader::new(&bytes);
    let vertex_base = r.u32_at(4).unwrap();

    // the only light set follows the vertex table, so the table holds 4 entries
    let root_data = config.to_offset(r.u32_at(root_record(&bytes, &config) + 16).unwrap(), 0).unwrap();
    assert_eq!(r.u32_at(root_data + 4).unwrap(), vertex_base + 4 * 16);

    let lists = model_lists(&bytes, &config);
    assert_eq!(lists.len(), 2);
    for list in lists {
        assert_eq!(vertex_loads(&bytes, list), vec![(4, vertex_base)]);
    }
}

#[test]
fn test_geometry_round_trip_is_byte_stable() {
    let config = CompileConfig::default();
    let first = compile_geometry(&sample_tree(), &PassthroughTextures, &config).unwrap();
    assert_eq!(first.len() % 16, 0);

    let decompiled = decompile_geometry(&first, &config).unwrap();
    assert!(decompiled.warnings.is_empty(), "{:?}", decompiled.warnings);

    let second = compile_geometry(&decompiled.output, &PassthroughTextures, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_geometry_round_trip_keeps_structure() {
    let config = CompileConfig::default();
    let bytes = compile_geometry(&sample_tree(), &PassthroughTextures, &config).unwrap();
    let tree = decompile_geometry(&bytes, &config).unwrap().output;

    let root = tree.root();
    let children: Vec<_> = tree.children(root).collect();
    assert_eq!(children.len(), 2);

    let house = tree.get(children[0]).unwrap().as_group().unwrap();
    assert_eq!(house.transform, Some(TransformMatrix::from_translation(100.0, 0.0, -50.0)));
    let lamp = tree.light_set(house.lights).unwrap();
    assert_eq!(lamp.ambient, [0x40, 0x40, 0x40]);
    assert_eq!(lamp.lights[0].direction, [0, -127, 0]);

    let (_, wall) = tree.models().next().unwrap();
    assert_eq!(wall.texture.as_deref(), Some("kmr_wall"));
    assert_eq!(wall.mesh.triangle_count(), 2);

    let floor = tree.get(children[1]).unwrap();
    assert_eq!(floor.properties, vec![Property::new(0x62, 0, 0x0000_8000)]);
    let commands = &floor.as_model().unwrap().mesh.commands;
    assert_eq!(commands[0], DisplayCommand::PipeSync);
    assert_eq!(commands[1], DisplayCommand::GeometryMode { clear: 0x0000_0400, set: 0x0020_0000 });
}

#[test]
fn test_light_sets_shared_by_identity() {
    let mut tree = ModelTree::new();
    let warm = LightSet::new("Warm", [0x20, 0x10, 0x10]);
    let shared = tree.add_light_set(warm.clone());
    let twin = tree.add_light_set(warm);
    tree.add_light_set(LightSet::new("Unused", [1, 2, 3]));
    let root = tree.root();
    for (name, lights) in [("A", shared), ("B", shared), ("C", twin)] {
        let g = tree.add_group(root, name, group(lights)).unwrap();
        tree.add_model(g, format!("{}_model", name), ModelData::new(Mesh::from_triangles(vec![tri(0)])))
            .unwrap();
    }

    let config = CompileConfig::default();
    let bytes = compile_geometry(&tree, &PassthroughTextures, &config).unwrap();
    let back = decompile_geometry(&bytes, &config).unwrap().output;

    // default, shared and twin; the unused set is never written
    assert_eq!(back.light_sets().len(), 3);
    let ids: Vec<LightSetId> = back
        .children(back.root())
        .map(|id| back.get(id).unwrap().as_group().unwrap().lights)
        .collect();
    assert_eq!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
}

#[test]
fn test_battle_stage_over_budget_fails() {
    let mut tree = ModelTree::new();
    let root = tree.root();
    let triangles: Vec<Triangle> = (0..800).map(|i| tri(i * 20)).collect();
    tree.add_model(root, "Big", ModelData::new(Mesh::from_triangles(triangles)))
        .unwrap();

    let err = compile_geometry(&tree, &PassthroughTextures, &CompileConfig::for_map("kmr_bt01")).unwrap_err();
    assert!(matches!(err, Error::SizeLimit { limit: 0x8000, .. }));
    assert!(compile_geometry(&tree, &PassthroughTextures, &CompileConfig::for_map("kmr_01")).is_ok());
}

#[test]
fn test_unknown_opcode_is_a_warning() {
    let mut mesh = Mesh::from_triangles(vec![tri(0)]);
    mesh.push(DisplayCommand::Raw([0x0800_0000, 0]));
    let mut tree = ModelTree::new();
    let root = tree.root();
    tree.add_model(root, "Odd", ModelData::new(mesh)).unwrap();

    let config = CompileConfig::default();
    let bytes = compile_geometry(&tree, &PassthroughTextures, &config).unwrap();

    let decompiled = decompile_geometry(&bytes, &config).unwrap();
    assert_eq!(decompiled.warnings.len(), 1);
    assert!(decompiled.warnings[0].message.contains("08"));
    assert_eq!(decompiled.output.models().next().unwrap().1.mesh.triangle_count(), 1);

    let extracted = extract_static_geometry(&bytes, &config).unwrap();
    assert_eq!(extracted.warnings.len(), 1);
    assert_eq!(extracted.output.triangles.len(), 1);
}

#[test]
fn test_extractor_applies_and_pops_transforms() {
    let config = CompileConfig::default();
    let bytes = compile_geometry(&sample_tree(), &PassthroughTextures, &config).unwrap();
    let extracted = extract_static_geometry(&bytes, &config).unwrap();
    assert!(extracted.warnings.is_empty());

    let tris = &extracted.output.triangles;
    assert_eq!(tris.len(), 4);
    // wall sits inside the translated group
    assert_eq!(tris[0][0], Vec3::new(100.0, 0.0, -50.0));
    assert_eq!(tris[1][1], Vec3::new(130.0, 0.0, -50.0));
    // floor is drawn after the pop
    assert_eq!(tris[2][0], Vec3::ZERO);
    assert_eq!(tris[3][2], Vec3::new(40.0, 0.0, 10.0));

    let bounds = extracted.output.bounds().unwrap();
    assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -50.0));
    assert_eq!(bounds.max, Vec3::new(130.0, 0.0, 10.0));
}

#[test]
fn test_corrupt_counts_fail_without_allocating() {
    let config = CompileConfig::default();
    let bytes = compile_geometry(&sample_tree(), &PassthroughTextures, &config).unwrap();
    let root = root_record(&bytes, &config);

    let mut props = bytes.clone();
    patch_word(&mut props, root + 8, 0xFFFF_FFF0);
    let err = decompile_geometry(&props, &config).unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }), "{:?}", err);

    let mut children = bytes.clone();
    let data = config.to_offset(BinReader::new(&bytes).u32_at(root + 16).unwrap(), 0).unwrap();
    patch_word(&mut children, data + 12, 0xFFFF_FFF0);
    let err = decompile_geometry(&children, &config).unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }), "{:?}", err);
}

#[test]
fn test_group_mesh_round_trip() {
    let mut tree = ModelTree::new();
    let root = tree.root();
    let mut deck = Mesh::default();
    deck.push(DisplayCommand::PipeSync);
    deck.push(DisplayCommand::Triangles(crate::mesh::TriangleBatch::new(vec![tri(100)])));
    let bridge = tree
        .add_group(
            root,
            "Bridge",
            group(LightSetId(0))
                .with_transform(TransformMatrix::from_translation(0.0, 20.0, 0.0))
                .with_mesh(deck.clone()),
        )
        .unwrap();
    tree.add_model(bridge, "Rail", ModelData::new(Mesh::from_triangles(vec![tri(0)])))
        .unwrap();

    let config = CompileConfig::default();
    let first = compile_geometry(&tree, &PassthroughTextures, &config).unwrap();
    let decompiled = decompile_geometry(&first, &config).unwrap();
    assert!(decompiled.warnings.is_empty(), "{:?}", decompiled.warnings);

    let back = decompiled.output;
    let bridge = back.children(back.root()).next().unwrap();
    assert_eq!(back.get(bridge).unwrap().as_group().unwrap().mesh, Some(deck));
    let rail = back.children(bridge).next().unwrap();
    let world = back.world_transform(rail).unwrap();
    assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(0.0, 20.0, 0.0));

    let second = compile_geometry(&back, &PassthroughTextures, &config).unwrap();
    assert_eq!(first, second);

    // children are drawn before the group's own geometry
    let tris = extract_static_geometry(&first, &config).unwrap().output.triangles;
    assert_eq!(tris.len(), 2);
    assert_eq!(tris[0][0], Vec3::new(0.0, 20.0, 0.0));
    assert_eq!(tris[1][0], Vec3::new(100.0, 20.0, 0.0));
}

#[test]
fn test_group_list_drawing_geometry_is_kept() {
    let config = CompileConfig::default();
    let mut bytes = compile_geometry(&sample_tree(), &PassthroughTextures, &config).unwrap();
    let floor_list = model_lists(&bytes, &config)[1];

    let root = root_record(&bytes, &config);
    let display = config.to_offset(BinReader::new(&bytes).u32_at(root + 4).unwrap(), root).unwrap();
    patch_word(&mut bytes, display, config.to_ptr(floor_list));

    let decompiled = decompile_geometry(&bytes, &config).unwrap();
    assert_eq!(decompiled.warnings.len(), 1);
    assert!(decompiled.warnings[0].message.contains("calls 0 lists"));

    let tree = decompiled.output;
    let root_mesh = tree.get(tree.root()).unwrap().as_group().unwrap().mesh.as_ref().unwrap();
    assert_eq!(root_mesh.triangle_count(), 2);
    assert_eq!(root_mesh.commands[0], DisplayCommand::PipeSync);
    assert_eq!(tree.models().count(), 2);
}

#[test]
fn test_equal_transforms_share_one_matrix() {
    let lift = TransformMatrix::from_translation(0.0, 50.0, 0.0);
    let mut tree = ModelTree::new();
    let root = tree.root();
    for name in ["A", "B"] {
        let g = tree.add_group(root, name, group(LightSetId(0)).with_transform(lift)).unwrap();
        tree.add_model(g, format!("{}_model", name), ModelData::new(Mesh::from_triangles(vec![tri(0)])))
            .unwrap();
    }

    let config = CompileConfig::default();
    let bytes = compile_geometry(&tree, &PassthroughTextures, &config).unwrap();
    let mut r = BinReader::new(&bytes);
    let root_data = config.to_offset(r.u32_at(root_record(&bytes, &config) + 16).unwrap(), 0).unwrap();
    let children = config.to_offset(r.u32_at(root_data + 16).unwrap(), 0).unwrap();

    let mut matrix_ptrs = Vec::new();
    for k in 0..2 {
        let record = config.to_offset(r.u32_at(children + 4 * k).unwrap(), 0).unwrap();
        let data = config.to_offset(r.u32_at(record + 16).unwrap(), 0).unwrap();
        matrix_ptrs.push(r.u32_at(data).unwrap());
    }
    assert_ne!(matrix_ptrs[0], 0);
    assert_eq!(matrix_ptrs[0], matrix_ptrs[1]);

    let back = decompile_geometry(&bytes, &config).unwrap().output;
    for id in back.children(back.root()) {
        assert_eq!(back.get(id).unwrap().as_group().unwrap().transform, Some(lift));
    }
}

#[test]
fn test_triangles_before_branch_warn() {
    let mut tree = ModelTree::new();
    let root = tree.root();
    tree.add_model(root, "Near", ModelData::new(Mesh::from_triangles(vec![tri(0)])))
        .unwrap();
    tree.add_model(root, "Far", ModelData::new(Mesh::from_triangles(vec![tri(50)])))
        .unwrap();

    let config = CompileConfig::default();
    let mut bytes = compile_geometry(&tree, &PassthroughTextures, &config).unwrap();
    let lists = model_lists(&bytes, &config);

    // turn the end of Near's mesh into a call to Far's list
    let end = {
        let mut r = BinReader::new(&bytes);
        let mut cmds = CommandReader::new(&mut r, lists[0]).unwrap();
        loop {
            let decoded = cmds.next_command().unwrap();
            if decoded.command == Command::End {
                break decoded.offset;
            }
        }
    };
    patch_word(&mut bytes, end, 0xDE00_0000);
    patch_word(&mut bytes, end + 4, config.to_ptr(lists[1]));

    let decompiled = decompile_geometry(&bytes, &config).unwrap();
    assert_eq!(decompiled.warnings.len(), 1);
    assert!(decompiled.warnings[0].message.contains("without a texture or matrix reset"));
    let (_, near) = decompiled.output.models().next().unwrap();
    assert_eq!(near.mesh.triangle_count(), 2);
}

fn sample_collision() -> (HitTree, HitTree) {
    let mut colliders = HitTree::new();
    let root = colliders.root();
    let room = colliders.add(root, HitObject::group("Room")).unwrap();
    colliders
        .add(room, HitObject::hit("Floor", vec![tri(0), tri(10)]).with_surface(0x8000, 1))
        .unwrap();
    colliders
        .add(room, HitObject::hit("Wall", vec![tri(0).double_sided(true)]))
        .unwrap();
    colliders.add(root, HitObject::hit("Ledge", vec![tri(50)])).unwrap();

    let mut zones = HitTree::new();
    let root = zones.root();
    let camera = CameraControl {
        control_type: 6,
        point_a: [-1_000_000.0, 0.0, 25.5],
        flag: true,
        ..Default::default()
    };
    zones
        .add(root, HitObject::hit("Entrance", vec![tri(0)]).with_camera(camera))
        .unwrap();
    zones.add(root, HitObject::hit("Hall", vec![tri(100)])).unwrap();
    (colliders, zones)
}

#[test]
fn test_collision_round_trip_is_byte_stable() {
    let (colliders, zones) = sample_collision();
    let first = compile_collision(&colliders, &zones).unwrap();
    let decompiled = decompile_collision(&first).unwrap();
    assert!(decompiled.warnings.is_empty(), "{:?}", decompiled.warnings);

    let trees = decompiled.output;
    let second = compile_collision(&trees.colliders, &trees.zones).unwrap();
    assert_eq!(first, second);

    assert_eq!(trees.colliders.post_order().len(), 4);
    let floor = trees.colliders.get(trees.colliders.post_order()[0]).unwrap();
    assert_eq!(floor.triangles, vec![tri(0), tri(10)]);
    assert_eq!(floor.flag_bits(), 0x8001);
}

#[test]
fn test_zone_camera_round_trip() {
    let (colliders, zones) = sample_collision();
    let bytes = compile_collision(&colliders, &zones).unwrap();
    let back = decompile_collision(&bytes).unwrap().output.zones;

    let order = back.post_order();
    let entrance = back.get(order[0]).unwrap().camera.unwrap();
    assert_eq!(entrance.control_type, 6);
    assert_eq!(entrance.point_a, [-1_000_000.0, 0.0, 25.5]);
    assert!(entrance.flag);
    assert!(back.get(order[1]).unwrap().camera.is_none());
}

#[test]
fn test_collision_vertex_capacity() {
    let distinct = |n: i16| -> Vec<Triangle> {
        let mut tris: Vec<Triangle> = (0..n / 3)
            .map(|k| Triangle::new(v(3 * k, 0, 0), v(3 * k + 1, 0, 0), v(3 * k + 2, 0, 0)))
            .collect();
        let last = n - 1;
        tris.push(Triangle::new(v(last - 2, 0, 0), v(last - 1, 0, 0), v(last, 0, 0)));
        tris
    };

    let mut ok = HitTree::new();
    let root = ok.root();
    ok.add(root, HitObject::hit("Full", distinct(1024))).unwrap();
    assert!(compile_collision(&ok, &HitTree::new()).is_ok());

    let mut over = HitTree::new();
    let root = over.root();
    over.add(root, HitObject::hit("Over", distinct(1025))).unwrap();
    let err = compile_collision(&over, &HitTree::new()).unwrap_err();
    assert!(matches!(err, Error::Capacity { count: 1025, limit: 1024, .. }));
}

#[test]
fn test_empty_collision_file() {
    let bytes = compile_collision(&HitTree::new(), &HitTree::new()).unwrap();
    let trees = decompile_collision(&bytes).unwrap().output;
    assert!(trees.colliders.is_empty());
    assert!(trees.zones.is_empty());
}
