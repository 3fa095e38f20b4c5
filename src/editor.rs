use crate::camera::Camera2D;
use crate::config::EditorConfig;
use crate::input::Input;
use crate::placement;
use crate::scene::{GridSettings, Scene};
use crate::textures::{GpuHandle, TextureStage};
use anyhow::{Context, Result};
use glam::Vec2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use winit::dpi::PhysicalSize;

/// Result of a dual-format save. The binary write is authoritative (its
/// failure is the Err path of `save_scene`); the JSON mirror may fail
/// independently, which is a valid, reported partial success.
#[derive(Debug)]
pub struct SaveOutcome {
    pub map_path: PathBuf,
    pub json_path: PathBuf,
    pub json_ok: bool,
}

/// A draw-ready entity: only entities whose texture survived the staging
/// pipeline appear here.
#[derive(Debug, Clone)]
pub struct SpriteDraw {
    pub handle: GpuHandle,
    pub position: Vec2,
    pub size: (u32, u32),
    pub layer: i32,
}

/// The single owned editor state: camera, scene, texture stage, and the
/// interaction fields the UI reads and writes through accessors. Nothing
/// here is global or duplicated.
pub struct EditorState {
    pub camera: Camera2D,
    pub scene: Scene,
    pub textures: TextureStage,
    pub asset_kinds: Vec<String>,
    pub selected_kind: Option<String>,
    pub placement_layer: i32,
    pub game_view_width: f32,
    pub game_view_height: f32,
    panel_width: f32,
    assets_dir: PathBuf,
    maps_dir: PathBuf,
    window_size: PhysicalSize<u32>,
    texture_paths: HashMap<String, PathBuf>,
    last_cursor: Option<(f32, f32)>,
}

impl EditorState {
    pub fn new(config: &EditorConfig) -> Self {
        let mut camera = Camera2D::new(config.view.game_view_width, config.view.game_view_height);
        camera.set_zoom_limits(config.view.zoom_min, config.view.zoom_max);

        let grid = GridSettings {
            cell_width: config.view.cell_width,
            cell_height: config.view.cell_height,
            ..GridSettings::default()
        };
        let mut scene = Scene::new("Untitled", grid);
        scene.game_view_width = config.view.game_view_width;
        scene.game_view_height = config.view.game_view_height;

        let mut state = Self {
            camera,
            scene,
            textures: TextureStage::new(),
            asset_kinds: Vec::new(),
            selected_kind: None,
            placement_layer: 0,
            game_view_width: config.view.game_view_width,
            game_view_height: config.view.game_view_height,
            panel_width: config.view.panel_width,
            assets_dir: PathBuf::from(&config.paths.assets_dir),
            maps_dir: PathBuf::from(&config.paths.maps_dir),
            window_size: PhysicalSize::new(config.window.width, config.window.height),
            texture_paths: HashMap::new(),
            last_cursor: None,
        };
        state.resize(state.window_size);
        state
    }

    /// Window resize. The camera sees the grid viewport (window minus the
    /// reserved UI panel), never the raw window size.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.window_size = size;
        let viewport_width = (size.width as f32 - self.panel_width).max(0.0) as u32;
        self.camera.resize(PhysicalSize::new(viewport_width, size.height));
    }

    pub fn panel_width(&self) -> f32 {
        self.panel_width
    }

    /// Converts a window-space cursor position to world space, accounting
    /// for the reserved panel margin. None while the cursor is over the
    /// panel or the viewport is degenerate.
    pub fn cursor_world_position(&self, cursor: (f32, f32)) -> Option<Vec2> {
        let view_x = cursor.0 - self.panel_width;
        if view_x < 0.0 {
            return None;
        }
        self.camera.screen_to_world(Vec2::new(view_x, cursor.1))
    }

    /// Per-frame pointer pipeline: wheel zoom, middle-drag pan, and
    /// edge-triggered place/remove.
    pub fn handle_pointer(&mut self, input: &mut Input) {
        if let Some(delta) = input.consume_wheel_delta() {
            self.camera.apply_scroll_zoom(delta);
        }

        let cursor = input.cursor_position();
        if input.middle_held() {
            if let (Some((last_x, last_y)), Some((x, y))) = (self.last_cursor, cursor) {
                let grid = &self.scene.grid;
                let factor =
                    (grid.cell_width + grid.cell_height) * 0.5 * 0.05 / self.camera.zoom();
                self.camera.move_by(-(x - last_x) * factor, (y - last_y) * factor);
            }
        }
        self.last_cursor = cursor;

        let world = cursor.and_then(|c| self.cursor_world_position(c));

        if input.take_left_click() {
            if let (Some(kind), Some(world)) = (self.selected_kind.clone(), world) {
                let snapped = placement::snap_to_cell(world, &self.scene.grid);
                if placement::place(&mut self.scene, &kind, snapped, self.placement_layer) {
                    eprintln!(
                        "[editor] placed '{kind}' at ({}, {}) layer {}",
                        snapped.x, snapped.y, self.placement_layer
                    );
                }
            }
        }

        if input.take_right_click() {
            if let Some(world) = world {
                let grid = self.scene.grid.clone();
                let snapped = placement::snap_to_cell(world, &grid);
                if let Some(removed) = placement::remove_at(&mut self.scene, snapped, &grid) {
                    eprintln!(
                        "[editor] removed '{}' at ({}, {})",
                        removed.kind, removed.x, removed.y
                    );
                }
            }
        }
    }

    pub fn new_scene(&mut self, name: &str) {
        let grid = self.scene.grid.clone();
        self.scene = Scene::new(name, grid);
        self.scene.game_view_width = self.game_view_width;
        self.scene.game_view_height = self.game_view_height;
        eprintln!("[scene] new scene '{name}'");
    }

    /// Default save location: `<maps_dir>/<scene name>`.
    pub fn default_save_stem(&self) -> PathBuf {
        self.maps_dir.join(&self.scene.name)
    }

    /// Writes `<stem>.map` (authoritative) then `<stem>.json` (mirror).
    /// The scene's saved path only advances after a good binary write; a
    /// failed mirror write does not roll the binary back.
    pub fn save_scene(&mut self, stem: impl AsRef<Path>) -> Result<SaveOutcome> {
        let stem = stem.as_ref();
        if let Some(parent) = stem.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Creating scene directory {}", parent.display()))?;
            }
        }

        self.scene.game_view_width = self.game_view_width;
        self.scene.game_view_height = self.game_view_height;

        let map_path = stem.with_extension("map");
        let json_path = stem.with_extension("json");

        self.scene.save_binary(&map_path)?;
        self.scene.path = Some(map_path.clone());

        let json_ok = match self.scene.save_json(&json_path) {
            Ok(()) => true,
            Err(err) => {
                eprintln!("[scene] binary saved but JSON mirror failed: {err:?}");
                false
            }
        };

        eprintln!("[scene] saved '{}' -> {}", self.scene.name, map_path.display());
        Ok(SaveOutcome { map_path, json_path, json_ok })
    }

    /// Loads a binary `.map` scene and syncs the persisted camera box
    /// into the camera's virtual size. This is the only call site of
    /// `set_virtual_size` after startup.
    pub fn load_scene(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut scene = Scene::load_binary(path)?;
        scene.path = Some(path.to_path_buf());
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            scene.name = stem.to_string();
        }

        self.game_view_width = scene.game_view_width;
        self.game_view_height = scene.game_view_height;
        self.camera.set_virtual_size(scene.game_view_width, scene.game_view_height);
        self.texture_paths.clear();

        eprintln!("[scene] loaded '{}' ({})", scene.name, path.display());
        self.scene = scene;
        Ok(())
    }

    /// Scans the assets folder for `.png` files (stems become placeable
    /// kinds), decodes them all on worker threads behind a join barrier,
    /// then runs the single batch GPU upload and frees CPU buffers. One
    /// missing folder degrades to an empty palette.
    pub fn discover_assets(&mut self) -> Result<Vec<String>> {
        if !self.assets_dir.is_dir() {
            eprintln!("[assets] assets folder not found: {}", self.assets_dir.display());
            self.asset_kinds.clear();
            return Ok(Vec::new());
        }

        let mut kinds = Vec::new();
        let entries = std::fs::read_dir(&self.assets_dir)
            .with_context(|| format!("Scanning assets folder {}", self.assets_dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                kinds.push(stem.to_string());
            }
        }
        kinds.sort();

        let started = Instant::now();
        let workers: Vec<_> = kinds
            .iter()
            .map(|kind| self.textures.request_load(self.assets_dir.join(format!("{kind}.png"))))
            .collect();
        for worker in workers {
            // A decode panic only loses that one asset.
            let _ = worker.join();
        }
        let cpu_elapsed = started.elapsed();
        eprintln!(
            "[assets] cpu decode of {} assets took {} ms",
            kinds.len(),
            cpu_elapsed.as_millis()
        );

        if self.textures.has_device() {
            let uploaded = self.textures.upload_all_pending()?;
            eprintln!(
                "[assets] gpu upload of {uploaded} textures took {} ms",
                started.elapsed().saturating_sub(cpu_elapsed).as_millis()
            );
            self.textures.release_cpu_buffers();
        } else {
            eprintln!("[assets] no GPU device installed; textures stay cpu-resident");
        }

        if self.selected_kind.is_none() {
            self.selected_kind = kinds.first().cloned();
        }
        self.asset_kinds = kinds.clone();
        Ok(kinds)
    }

    /// Asset-folder-relative texture path for a kind, cached so render
    /// code never rebuilds the string per frame.
    pub fn texture_path_for(&mut self, kind: &str) -> &Path {
        let assets_dir = &self.assets_dir;
        self.texture_paths
            .entry(kind.to_string())
            .or_insert_with(|| assets_dir.join(format!("{kind}.png")))
    }

    /// Entities in draw order with resolved GPU handles. Entities whose
    /// kind has no uploaded texture (dangling reference, failed decode)
    /// are skipped, never an error.
    pub fn visible_sprites(&mut self) -> Vec<SpriteDraw> {
        let assets_dir = &self.assets_dir;
        let texture_paths = &mut self.texture_paths;
        let textures = &self.textures;
        self.scene
            .entities_for_render()
            .iter()
            .filter_map(|entity| {
                let path = texture_paths
                    .entry(entity.kind.clone())
                    .or_insert_with(|| assets_dir.join(format!("{}.png", entity.kind)));
                let handle = textures.gpu_handle(&*path)?;
                let size = textures.gpu_size(&*path).unwrap_or((0, 0));
                Some(SpriteDraw {
                    handle,
                    position: Vec2::new(entity.x, entity.y),
                    size,
                    layer: entity.layer,
                })
            })
            .collect()
    }

    /// Final teardown; must run before the rendering context goes away.
    pub fn shutdown(&mut self) {
        self.textures.shutdown();
    }
}
