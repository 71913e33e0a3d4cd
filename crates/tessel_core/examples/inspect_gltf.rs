//! Example: Load and inspect a .gltf or .glb file.
//!
//! Run with: cargo run --example inspect_gltf -- assets/box.glb

use std::env;

use tessel_core::{load_gltf, Document, MeshData, WorldCache};

fn print_node(doc: &Document, cache: &WorldCache, scene: usize, node: usize, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    let name = doc
        .node(node)
        .and_then(|n| n.name.as_deref())
        .unwrap_or("<unnamed>");
    let pos = cache
        .world_matrix(scene, node)
        .map(|m| m.w_axis.truncate())
        .unwrap_or_default();
    println!(
        "{}[{}] {} at ({:.2}, {:.2}, {:.2})",
        indent, node, name, pos.x, pos.y, pos.z
    );

    for &child in doc.node_children(node).unwrap_or(&[]) {
        print_node(doc, cache, scene, child as usize, depth + 1);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_gltf <path-to-gltf-or-glb>");
        println!("\nExamples:");
        println!("  cargo run --example inspect_gltf -- assets/box.glb");
        println!("  cargo run --example inspect_gltf -- assets/scene.gltf");
        return;
    }

    let path = &args[1];
    println!("Loading file: {}", path);

    let doc = match load_gltf(path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error loading file: {}", e);
            return;
        }
    };

    let asset = doc.asset();
    println!("\n=== Asset {} ===", asset.version);
    if let Some(generator) = &asset.generator {
        println!("Generator: {}", generator);
    }
    println!("Scenes: {}", doc.scene_count());
    println!("Nodes: {}", doc.node_count());
    println!("Meshes: {}", doc.mesh_count());
    println!("Accessors: {}", doc.accessor_count());
    println!("Materials: {}", doc.materials().len());
    println!("Images: {}", doc.images().len());

    println!("\n--- Meshes ---");
    for (m, mesh) in doc.meshes().iter().enumerate() {
        println!("  [{}] {}", m, mesh.name.as_deref().unwrap_or("<unnamed>"));
        for p in 0..mesh.primitives.len() {
            match MeshData::from_primitive(&doc, m, p) {
                Ok(data) => println!(
                    "       primitive {}: {} vertices, {} triangles, normals: {}",
                    p,
                    data.vertex_count(),
                    data.triangle_count(),
                    data.has_normals()
                ),
                Err(e) => println!("       primitive {}: {}", p, e),
            }
        }
    }

    let mut cache = WorldCache::new(&doc);
    for scene in 0..doc.scene_count() {
        let name = doc
            .scene(scene)
            .and_then(|s| s.name.as_deref())
            .unwrap_or("<unnamed>");
        println!("\n--- Scene {} ({}) ---", scene, name);

        if let Err(e) = cache.compute(&doc, scene) {
            eprintln!("  Error evaluating scene: {}", e);
            continue;
        }
        for &root in doc.scene_roots(scene).unwrap_or(&[]) {
            print_node(&doc, &cache, scene, root as usize, 0);
        }

        match cache.world_bounds(&doc, scene) {
            Ok(Some(bounds)) if !bounds.is_empty() => println!(
                "  Bounds: ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
                bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
            ),
            Ok(_) => {}
            Err(e) => eprintln!("  Error computing bounds: {}", e),
        }
    }
}
