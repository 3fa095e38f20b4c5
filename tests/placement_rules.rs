use glam::Vec2;
use tempfile::tempdir;
use tilewright::config::EditorConfig;
use tilewright::editor::EditorState;
use tilewright::placement::{self, snap_to_cell};
use tilewright::scene::{GridSettings, Scene};

#[test]
fn place_save_reload_scenario() {
    // New scene "Untitled", 16x16 cells. World position (24, 24) snaps to
    // the cell center (24, 24): floor(24/16)*16 + 8 = 24.
    let config = EditorConfig::default();
    let mut editor = EditorState::new(&config);
    assert_eq!(editor.scene.name, "Untitled");

    let snapped = snap_to_cell(Vec2::new(24.0, 24.0), &editor.scene.grid);
    assert_eq!(snapped, Vec2::new(24.0, 24.0));

    assert!(placement::place(&mut editor.scene, "wall", snapped, 0));
    assert_eq!(editor.scene.entities.len(), 1);

    // Same spot, same layer: still exactly one entity.
    assert!(!placement::place(&mut editor.scene, "wall", snapped, 0));
    assert_eq!(editor.scene.entities.len(), 1);

    // Same spot, different layer: stacking is allowed.
    assert!(placement::place(&mut editor.scene, "wall", snapped, 1));
    assert_eq!(editor.scene.entities.len(), 2);

    let dir = tempdir().expect("temp dir");
    let outcome = editor.save_scene(dir.path().join("test")).expect("save scene pair");
    assert!(outcome.json_ok);
    assert!(outcome.map_path.exists());
    assert!(outcome.json_path.exists());
    assert_eq!(editor.scene.path.as_deref(), Some(outcome.map_path.as_path()));

    editor.new_scene("scratch");
    assert!(editor.scene.entities.is_empty());

    editor.load_scene(&outcome.map_path).expect("reload scene");
    assert_eq!(editor.scene.name, "test");
    assert_eq!(editor.scene.entities.len(), 2);
    for entity in &editor.scene.entities {
        assert_eq!(entity.kind, "wall");
        assert!((entity.x - 24.0).abs() < f32::EPSILON);
        assert!((entity.y - 24.0).abs() < f32::EPSILON);
    }
    let layers: Vec<i32> = editor.scene.entities.iter().map(|e| e.layer).collect();
    assert_eq!(layers, vec![0, 1]);
}

#[test]
fn failed_binary_save_leaves_path_unset() {
    let dir = tempdir().expect("temp dir");
    // A file where the parent directory should be makes create_dir_all fail.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"file, not a directory").expect("write blocker");

    let mut editor = EditorState::new(&EditorConfig::default());
    let err = editor.save_scene(blocker.join("scene"));
    assert!(err.is_err());
    assert!(editor.scene.path.is_none(), "failed save must not advance the scene path");
}

#[test]
fn reload_restores_game_view_into_camera() {
    let dir = tempdir().expect("temp dir");
    let grid = GridSettings::default();
    let mut scene = Scene::new("viewbox", grid);
    scene.game_view_width = 1600.0;
    scene.game_view_height = 900.0;
    let path = dir.path().join("viewbox.map");
    scene.save_binary(&path).expect("save");

    let mut editor = EditorState::new(&EditorConfig::default());
    editor.load_scene(&path).expect("load");
    assert_eq!(editor.camera.virtual_size(), (1600.0, 900.0));
    assert!((editor.game_view_width - 1600.0).abs() < f32::EPSILON);
}

#[test]
fn removal_prefers_the_first_match_across_layers() {
    let grid = GridSettings::default();
    let mut scene = Scene::new("stack", grid.clone());
    let spot = Vec2::new(40.0, 40.0);
    placement::place(&mut scene, "floor", spot, 0);
    placement::place(&mut scene, "wall", spot, 3);
    placement::place(&mut scene, "torch", spot, 7);

    let removed = placement::remove_at(&mut scene, spot, &grid).expect("removed one");
    assert_eq!(removed.kind, "floor");
    assert_eq!(scene.entities.len(), 2);

    // Repeated removal peels the stack one entity at a time.
    assert!(placement::remove_at(&mut scene, spot, &grid).is_some());
    assert!(placement::remove_at(&mut scene, spot, &grid).is_some());
    assert!(placement::remove_at(&mut scene, spot, &grid).is_none());
}

#[test]
fn entities_render_sorted_after_reload() {
    let dir = tempdir().expect("temp dir");
    let grid = GridSettings::default();
    let mut scene = Scene::new("sorted", grid);
    placement::place(&mut scene, "top", Vec2::new(8.0, 8.0), 5);
    placement::place(&mut scene, "bottom", Vec2::new(8.0, 8.0), -1);
    let path = dir.path().join("sorted.map");
    scene.save_binary(&path).expect("save");

    let mut loaded = Scene::load_binary(&path).expect("load");
    assert!(loaded.needs_sort());
    let kinds: Vec<String> =
        loaded.entities_for_render().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, vec!["bottom".to_string(), "top".to_string()]);
}
