pub mod camera;
pub mod config;
pub mod editor;
pub mod input;
pub mod placement;
pub mod scene;
pub mod textures;

pub use camera::Camera2D;
pub use config::EditorConfig;
pub use editor::{EditorState, SaveOutcome};
pub use input::{Input, InputEvent};
pub use scene::{Entity, GridSettings, Scene};
pub use textures::{GpuHandle, TextureStage};
