use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::env;
use std::process;
use tilewright::scene::Scene;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "inspect" => {
            let map_path = args
                .next()
                .ok_or_else(|| anyhow!("inspect requires a path: map_tool inspect <file.map>"))?;
            cmd_inspect(&map_path)
        }
        "export-json" => {
            let map_path = args.next().ok_or_else(|| {
                anyhow!("export-json requires arguments: map_tool export-json <file.map> <out.json>")
            })?;
            let out_path = args.next().ok_or_else(|| anyhow!("export-json missing output path"))?;
            cmd_export_json(&map_path, &out_path)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Map Tool

Usage:
  map_tool inspect <file.map>                Print a scene summary
  map_tool export-json <file.map> <out.json> Regenerate the JSON mirror
  map_tool help                              Show this message
"
    );
}

fn cmd_inspect(map_path: &str) -> Result<()> {
    let scene = Scene::load_binary(map_path)?;
    println!("scene:     {}", scene.name);
    println!("grid:      {}x{} cells ({} rows, {} cols)", scene.grid.cell_width, scene.grid.cell_height, scene.grid.rows, scene.grid.cols);
    println!("game view: {}x{}", scene.game_view_width, scene.game_view_height);
    println!("entities:  {}", scene.entities.len());

    let mut per_layer: BTreeMap<i32, usize> = BTreeMap::new();
    for entity in &scene.entities {
        *per_layer.entry(entity.layer).or_default() += 1;
    }
    for (layer, count) in per_layer {
        println!("  layer {layer}: {count}");
    }
    Ok(())
}

fn cmd_export_json(map_path: &str, out_path: &str) -> Result<()> {
    let scene = Scene::load_binary(map_path)?;
    scene.save_json(out_path)?;
    println!("wrote {out_path} ({} entities)", scene.entities.len());
    Ok(())
}
