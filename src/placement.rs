use crate::scene::{Entity, GridSettings, Scene};
use glam::Vec2;

/// Two cell-center positions closer than this (per axis) count as the
/// same spot for duplicate rejection.
pub const DUPLICATE_EPSILON: f32 = 0.1;

/// Snaps a world position to the center of its grid cell, independently
/// per axis.
pub fn snap_to_cell(world: Vec2, grid: &GridSettings) -> Vec2 {
    Vec2::new(
        (world.x / grid.cell_width).floor() * grid.cell_width + grid.cell_width * 0.5,
        (world.y / grid.cell_height).floor() * grid.cell_height + grid.cell_height * 0.5,
    )
}

/// Places an entity at an already-snapped position. Duplicates are only
/// blocked on the SAME layer; stacking at one cell across layers is
/// valid. Returns false (no-op) when rejected.
pub fn place(scene: &mut Scene, kind: &str, snapped: Vec2, layer: i32) -> bool {
    let already_placed = scene.entities.iter().any(|existing| {
        existing.layer == layer
            && (existing.x - snapped.x).abs() < DUPLICATE_EPSILON
            && (existing.y - snapped.y).abs() < DUPLICATE_EPSILON
    });
    if already_placed {
        return false;
    }
    scene.entities.push(Entity { kind: kind.to_string(), x: snapped.x, y: snapped.y, layer });
    scene.mark_entities_dirty();
    true
}

/// Removes the first entity, on any layer, within half a cell of the
/// snapped point. Returns the removed entity, or None when nothing
/// matched.
pub fn remove_at(scene: &mut Scene, snapped: Vec2, grid: &GridSettings) -> Option<Entity> {
    let index = scene.entities.iter().position(|entity| {
        (entity.x - snapped.x).abs() < grid.cell_width * 0.5
            && (entity.y - snapped.y).abs() < grid.cell_height * 0.5
    })?;
    let removed = scene.entities.remove(index);
    scene.mark_entities_dirty();
    Some(removed)
}
