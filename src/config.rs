use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Tilewright".to_string(), width: 1280, height: 720 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "PathsConfig::default_maps_dir")]
    pub maps_dir: String,
    #[serde(default = "PathsConfig::default_assets_dir")]
    pub assets_dir: String,
}

impl PathsConfig {
    fn default_maps_dir() -> String {
        "maps".to_string()
    }

    fn default_assets_dir() -> String {
        "assets".to_string()
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { maps_dir: Self::default_maps_dir(), assets_dir: Self::default_assets_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "ViewConfig::default_zoom_min")]
    pub zoom_min: f32,
    #[serde(default = "ViewConfig::default_zoom_max")]
    pub zoom_max: f32,
    #[serde(default = "ViewConfig::default_panel_width")]
    pub panel_width: f32,
    #[serde(default = "ViewConfig::default_game_view_width")]
    pub game_view_width: f32,
    #[serde(default = "ViewConfig::default_game_view_height")]
    pub game_view_height: f32,
    #[serde(default = "ViewConfig::default_cell_size")]
    pub cell_width: f32,
    #[serde(default = "ViewConfig::default_cell_size")]
    pub cell_height: f32,
}

impl ViewConfig {
    const fn default_zoom_min() -> f32 {
        0.1
    }

    const fn default_zoom_max() -> f32 {
        100.0
    }

    /// Pixels reserved for the UI panel on the left of the grid viewport.
    const fn default_panel_width() -> f32 {
        320.0
    }

    const fn default_game_view_width() -> f32 {
        2000.0
    }

    const fn default_game_view_height() -> f32 {
        720.0
    }

    const fn default_cell_size() -> f32 {
        16.0
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_min: Self::default_zoom_min(),
            zoom_max: Self::default_zoom_max(),
            panel_width: Self::default_panel_width(),
            game_view_width: Self::default_game_view_width(),
            game_view_height: Self::default_game_view_height(),
            cell_width: Self::default_cell_size(),
            cell_height: Self::default_cell_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EditorConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

impl EditorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[editor] config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}
