//! Geometry file inspector.
//!
//! Decompiles shape and hit files in parallel and prints a JSON summary per
//! file. With `--recompile` each file is compiled again and compared byte for
//! byte against the input.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::{json, Value};

use shapecodec::codec::{
    compile_collision, compile_geometry, decompile_collision, decompile_geometry,
    extract_static_geometry, read_name_tables, CompileConfig, LegacyTextureNames,
    PassthroughTextures, TextureResolver,
};
use shapecodec::core::{logging, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileKind {
    Shape,
    Hit,
}

impl FileKind {
    fn guess(path: &Path) -> Self {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with("_hit") {
            FileKind::Hit
        } else {
            FileKind::Shape
        }
    }
}

#[derive(Debug)]
struct Args {
    files: Vec<PathBuf>,
    kind: Option<FileKind>,
    config: Option<PathBuf>,
    texture_prefix: Option<String>,
    recompile: bool,
    verbose: bool,
    jobs: usize,
}

fn parse_args() -> std::result::Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        files: Vec::new(),
        kind: None,
        config: None,
        texture_prefix: None,
        recompile: false,
        verbose: false,
        jobs: 0,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--shape" => parsed.kind = Some(FileKind::Shape),
            "--hit" => parsed.kind = Some(FileKind::Hit),
            "--recompile" => parsed.recompile = true,
            "-v" | "--verbose" => parsed.verbose = true,
            "-c" | "--config" => {
                parsed.config = Some(PathBuf::from(args.next().ok_or("--config needs a path")?));
            }
            "-t" | "--texture-prefix" => {
                parsed.texture_prefix = Some(args.next().ok_or("--texture-prefix needs a value")?);
            }
            "-j" | "--jobs" => {
                let v = args.next().ok_or("--jobs needs a number")?;
                parsed.jobs = v.parse().map_err(|_| format!("bad job count '{}'", v))?;
            }
            "-h" | "--help" => return Err("show_help".to_string()),
            _ if arg.starts_with('-') => return Err(format!("unknown option '{}'", arg)),
            _ => parsed.files.push(PathBuf::from(arg)),
        }
    }

    if parsed.files.is_empty() {
        return Err("no input files".to_string());
    }
    Ok(parsed)
}

fn print_help() {
    println!("Usage: geom_info [OPTIONS] FILE...");
    println!();
    println!("Options:");
    println!("  --shape / --hit             Force the file kind (default: *_hit is collision)");
    println!("  --recompile                 Compile the decompiled result and compare bytes");
    println!("  -c, --config <FILE>         JSON compile config");
    println!("  -t, --texture-prefix <P>    Store texture names as <P><name>tif on recompile");
    println!("  -j, --jobs <N>              Worker threads (default: all cores)");
    println!("  -v, --verbose               Log every node record");
}

fn shape_summary(bytes: &[u8], args: &Args, config: &CompileConfig) -> Result<Value> {
    let decompiled = decompile_geometry(bytes, config)?;
    let tree = &decompiled.output;
    let extracted = extract_static_geometry(bytes, config)?;
    let names = read_name_tables(bytes, config)?;

    let mut summary = json!({
        "kind": "shape",
        "size": bytes.len(),
        "nodes": tree.node_count(),
        "models": tree.models().count(),
        "light_sets": tree.light_sets().len(),
        "triangles": extracted.output.triangles.len(),
        "named_models": names.models.len(),
        "warnings": decompiled.warnings.iter().chain(&extracted.warnings).map(|w| w.to_string()).collect::<Vec<_>>(),
    });
    if let Some(b) = extracted.output.bounds() {
        summary["bounds"] = json!({ "min": b.min.to_array(), "max": b.max.to_array() });
    }

    if args.recompile {
        let legacy;
        let textures: &dyn TextureResolver = match &args.texture_prefix {
            Some(prefix) => {
                legacy = LegacyTextureNames { prefix: prefix.clone() };
                &legacy
            }
            None => &PassthroughTextures,
        };
        let again = compile_geometry(tree, textures, config)?;
        summary["identical"] = json!(again == bytes);
    }
    Ok(summary)
}

fn hit_summary(bytes: &[u8], args: &Args) -> Result<Value> {
    let decompiled = decompile_collision(bytes)?;
    let trees = &decompiled.output;
    let triangles = |t: &shapecodec::hit::HitTree| -> usize {
        t.post_order().iter().filter_map(|&id| t.get(id)).map(|o| o.triangles.len()).sum()
    };

    let mut summary = json!({
        "kind": "hit",
        "size": bytes.len(),
        "colliders": trees.colliders.post_order().len(),
        "collider_triangles": triangles(&trees.colliders),
        "zones": trees.zones.post_order().len(),
        "zone_triangles": triangles(&trees.zones),
        "warnings": decompiled.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    });

    if args.recompile {
        let again = compile_collision(&trees.colliders, &trees.zones)?;
        summary["identical"] = json!(again == bytes);
    }
    Ok(summary)
}

fn inspect(path: &Path, args: &Args, config: &CompileConfig) -> Result<Value> {
    let bytes = std::fs::read(path)?;
    let kind = args.kind.unwrap_or_else(|| FileKind::guess(path));
    match kind {
        FileKind::Shape => shape_summary(&bytes, args, config),
        FileKind::Hit => hit_summary(&bytes, args),
    }
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            if e == "show_help" {
                print_help();
                return;
            }
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    if args.verbose {
        logging::init_with("debug");
    } else {
        logging::init();
    }

    if args.jobs > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(args.jobs).build_global() {
            log::warn!("Could not size thread pool: {}", e);
        }
    }

    let start = Instant::now();
    let results: Vec<(PathBuf, Value)> = args
        .files
        .par_iter()
        .map(|path| {
            let config = match &args.config {
                Some(c) => CompileConfig::load(c),
                None => Ok(CompileConfig::for_map(
                    path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
                )),
            };
            let value = config
                .and_then(|config| inspect(path, &args, &config))
                .unwrap_or_else(|e| json!({ "error": e.to_string() }));
            (path.clone(), value)
        })
        .collect();

    let mut failed = false;
    for (path, mut value) in results {
        failed |= value.get("error").is_some() || value.get("identical") == Some(&json!(false));
        value["file"] = json!(path.display().to_string());
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    log::info!("Inspected {} files in {:.2}s", args.files.len(), start.elapsed().as_secs_f64());

    if failed {
        std::process::exit(1);
    }
}
