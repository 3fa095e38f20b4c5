use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Current binary scene format version. Version 1 is the legacy layout
/// without the game-view pair; loaders accept both, writers always emit
/// the current version.
pub const SCENE_FORMAT_VERSION: i32 = 2;
const LEGACY_FORMAT_VERSION: i32 = 1;

// Corrupt-file guards: cap for length-prefixed strings, and cap for
// the entity-count preallocation (reads past the real count still fail
// on end-of-file, so a lying count costs nothing but a few reallocs).
const MAX_STRING_LEN: u32 = 1 << 20;
const MAX_ENTITY_PREALLOC: usize = 1 << 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSettings {
    #[serde(default = "GridSettings::default_cell")]
    pub cell_width: f32,
    #[serde(default = "GridSettings::default_cell")]
    pub cell_height: f32,
    #[serde(default = "GridSettings::default_rows")]
    pub rows: i32,
    #[serde(default = "GridSettings::default_cols")]
    pub cols: i32,
}

impl GridSettings {
    const fn default_cell() -> f32 {
        16.0
    }

    const fn default_rows() -> i32 {
        30
    }

    const fn default_cols() -> i32 {
        30
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            cell_width: Self::default_cell(),
            cell_height: Self::default_cell(),
            rows: Self::default_rows(),
            cols: Self::default_cols(),
        }
    }
}

/// A placed entity. Entities have no identity beyond this tuple and are
/// compared structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub layer: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "sceneName", default = "Scene::default_name")]
    pub name: String,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Camera-box world dimensions, persisted so reloading restores the
    /// same logical viewport.
    #[serde(rename = "gameViewWidth", default = "Scene::default_game_view_width")]
    pub game_view_width: f32,
    #[serde(rename = "gameViewHeight", default = "Scene::default_game_view_height")]
    pub game_view_height: f32,
    /// Last saved/loaded binary location; None while unsaved.
    #[serde(skip)]
    pub path: Option<PathBuf>,
    #[serde(skip)]
    needs_sort: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Self::default_name(), GridSettings::default())
    }
}

impl Scene {
    pub fn new(name: impl Into<String>, grid: GridSettings) -> Self {
        Self {
            name: name.into(),
            grid,
            entities: Vec::new(),
            game_view_width: Self::default_game_view_width(),
            game_view_height: Self::default_game_view_height(),
            path: None,
            needs_sort: false,
        }
    }

    fn default_name() -> String {
        "Untitled".to_string()
    }

    pub(crate) const fn default_game_view_width() -> f32 {
        2000.0
    }

    pub(crate) const fn default_game_view_height() -> f32 {
        720.0
    }

    /// Flags the entity list for re-sorting before the next render.
    pub fn mark_entities_dirty(&mut self) {
        self.needs_sort = true;
    }

    pub fn needs_sort(&self) -> bool {
        self.needs_sort
    }

    /// Entities in draw order, lower layers first. The stable sort runs
    /// lazily, only when placements/removals happened since the last call.
    pub fn entities_for_render(&mut self) -> &[Entity] {
        if self.needs_sort {
            self.entities.sort_by_key(|entity| entity.layer);
            self.needs_sort = false;
        }
        &self.entities
    }

    // ----- binary codec (.map, authoritative) -----

    pub fn save_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = fs::File::create(path)
            .with_context(|| format!("Creating scene file {}", path.display()))?;
        let mut out = BufWriter::new(file);

        write_i32(&mut out, SCENE_FORMAT_VERSION)?;
        write_string(&mut out, &self.name)?;
        write_f32(&mut out, self.grid.cell_width)?;
        write_f32(&mut out, self.grid.cell_height)?;
        write_i32(&mut out, self.grid.rows)?;
        write_i32(&mut out, self.grid.cols)?;
        write_f32(&mut out, self.game_view_width)?;
        write_f32(&mut out, self.game_view_height)?;

        let count = i32::try_from(self.entities.len())
            .with_context(|| format!("Scene '{}' has too many entities to serialize", self.name))?;
        write_i32(&mut out, count)?;
        for entity in &self.entities {
            write_string(&mut out, &entity.kind)?;
            write_f32(&mut out, entity.x)?;
            write_f32(&mut out, entity.y)?;
            write_i32(&mut out, entity.layer)?;
        }
        out.flush().with_context(|| format!("Writing scene file {}", path.display()))?;
        Ok(())
    }

    /// Loads a binary scene. Returns a fresh Scene so a failed load never
    /// leaves partially read state anywhere.
    pub fn load_binary(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .with_context(|| format!("Opening scene file {}", path.display()))?;
        let mut input = BufReader::new(file);

        let version = read_i32(&mut input)?;
        if version != SCENE_FORMAT_VERSION && version != LEGACY_FORMAT_VERSION {
            bail!("Unsupported scene format version {version} in {}", path.display());
        }

        let name = read_string(&mut input)?;
        let grid = GridSettings {
            cell_width: read_f32(&mut input)?,
            cell_height: read_f32(&mut input)?,
            rows: read_i32(&mut input)?,
            cols: read_i32(&mut input)?,
        };
        // Version 1 predates the persisted camera box.
        let (game_view_width, game_view_height) = if version >= 2 {
            (read_f32(&mut input)?, read_f32(&mut input)?)
        } else {
            (Self::default_game_view_width(), Self::default_game_view_height())
        };

        let count = read_i32(&mut input)?;
        if count < 0 {
            bail!("Negative entity count in {}", path.display());
        }
        let mut entities = Vec::with_capacity((count as usize).min(MAX_ENTITY_PREALLOC));
        for _ in 0..count {
            let kind = read_string(&mut input)?;
            let x = read_f32(&mut input)?;
            let y = read_f32(&mut input)?;
            let layer = read_i32(&mut input)?;
            entities.push(Entity { kind, x, y, layer });
        }

        Ok(Self {
            name,
            grid,
            entities,
            game_view_width,
            game_view_height,
            path: None,
            needs_sort: true,
        })
    }

    // ----- JSON mirror (diagnostic, regenerated on every save) -----

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes())
            .with_context(|| format!("Writing scene mirror {}", path.display()))?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Reading scene mirror {}", path.display()))?;
        let mut scene = serde_json::from_slice::<Scene>(&bytes)
            .with_context(|| format!("Parsing scene mirror {}", path.display()))?;
        scene.needs_sort = true;
        Ok(scene)
    }
}

// Raw native-endian field helpers. The format is positional; write and
// read order must mirror each other exactly.

fn write_i32(out: &mut impl Write, value: i32) -> Result<()> {
    out.write_all(&value.to_ne_bytes())?;
    Ok(())
}

fn write_f32(out: &mut impl Write, value: f32) -> Result<()> {
    out.write_all(&value.to_ne_bytes())?;
    Ok(())
}

fn write_u32(out: &mut impl Write, value: u32) -> Result<()> {
    out.write_all(&value.to_ne_bytes())?;
    Ok(())
}

fn write_string(out: &mut impl Write, value: &str) -> Result<()> {
    let len = u32::try_from(value.len()).context("String too long to serialize")?;
    write_u32(out, len)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_i32(input: &mut impl Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).context("Unexpected end of scene file")?;
    Ok(i32::from_ne_bytes(buf))
}

fn read_f32(input: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).context("Unexpected end of scene file")?;
    Ok(f32::from_ne_bytes(buf))
}

fn read_u32(input: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).context("Unexpected end of scene file")?;
    Ok(u32::from_ne_bytes(buf))
}

fn read_string(input: &mut impl Read) -> Result<String> {
    let len = read_u32(input)?;
    if len > MAX_STRING_LEN {
        bail!("String length {len} exceeds sanity limit; scene file is corrupt");
    }
    let mut bytes = vec![0u8; len as usize];
    input.read_exact(&mut bytes).context("Unexpected end of scene file")?;
    String::from_utf8(bytes).context("Scene string is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: &str, x: f32, y: f32, layer: i32) -> Entity {
        Entity { kind: kind.to_string(), x, y, layer }
    }

    #[test]
    fn render_order_sorts_by_layer_lazily() {
        let mut scene = Scene::default();
        scene.entities.push(entity("a", 0.0, 0.0, 2));
        scene.entities.push(entity("b", 0.0, 0.0, 0));
        scene.entities.push(entity("c", 0.0, 0.0, 1));
        assert!(!scene.needs_sort());

        scene.mark_entities_dirty();
        let layers: Vec<i32> = scene.entities_for_render().iter().map(|e| e.layer).collect();
        assert_eq!(layers, vec![0, 1, 2]);
        assert!(!scene.needs_sort());
    }

    #[test]
    fn sort_is_stable_within_a_layer() {
        let mut scene = Scene::default();
        scene.entities.push(entity("first", 1.0, 0.0, 0));
        scene.entities.push(entity("second", 2.0, 0.0, 0));
        scene.mark_entities_dirty();
        let kinds: Vec<&str> =
            scene.entities_for_render().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["first", "second"]);
    }

    #[test]
    fn json_defaults_fill_missing_keys() {
        let scene: Scene = serde_json::from_str("{}").expect("empty doc should parse");
        assert_eq!(scene.name, "Untitled");
        assert!((scene.grid.cell_width - 16.0).abs() < f32::EPSILON);
        assert!((scene.grid.cell_height - 16.0).abs() < f32::EPSILON);
        assert_eq!(scene.grid.rows, 30);
        assert_eq!(scene.grid.cols, 30);
        assert!(scene.entities.is_empty());
        assert!((scene.game_view_width - 2000.0).abs() < f32::EPSILON);
        assert!((scene.game_view_height - 720.0).abs() < f32::EPSILON);
    }

    #[test]
    fn json_mirror_uses_original_key_names() {
        let mut scene = Scene::new("keys", GridSettings::default());
        scene.entities.push(entity("wall", 24.0, 24.0, 0));
        let json = serde_json::to_string(&scene).expect("serialize");
        assert!(json.contains("\"sceneName\""));
        assert!(json.contains("\"cellWidth\""));
        assert!(json.contains("\"type\":\"wall\""));
        assert!(!json.contains("needs_sort"));
        assert!(!json.contains("\"path\""));
    }
}
