use glam::{Mat4, Vec2, Vec4};
use winit::dpi::PhysicalSize;

/// Orthographic editor camera. The virtual size defines the reference
/// resolution that "zoom = 1.0" spans; the actual viewport size only
/// contributes its aspect ratio.
#[derive(Debug, Clone)]
pub struct Camera2D {
    pub position: Vec2,
    zoom: f32,
    virtual_width: f32,
    virtual_height: f32,
    view_size: PhysicalSize<u32>,
    zoom_limits: (f32, f32),
}

pub const DEFAULT_ZOOM_LIMITS: (f32, f32) = (0.1, 100.0);

impl Camera2D {
    pub fn new(virtual_width: f32, virtual_height: f32) -> Self {
        debug_assert!(virtual_width > 0.0 && virtual_height > 0.0);
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            virtual_width,
            virtual_height,
            view_size: PhysicalSize::new(virtual_width as u32, virtual_height as u32),
            zoom_limits: DEFAULT_ZOOM_LIMITS,
        }
    }

    /// Window resize only affects the aspect ratio, never the virtual size.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.view_size = size;
    }

    /// Changes what "zoom = 1.0" means. Only call on scene load; calling
    /// this during an interactive resize makes the apparent zoom jump.
    pub fn set_virtual_size(&mut self, width: f32, height: f32) {
        debug_assert!(width > 0.0 && height > 0.0);
        self.virtual_width = width;
        self.virtual_height = height;
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn move_by(&mut self, dx: f32, dy: f32) {
        self.position.x += dx;
        self.position.y += dy;
    }

    pub fn set_zoom_limits(&mut self, min: f32, max: f32) {
        debug_assert!(min > 0.0 && max > min);
        self.zoom_limits = (min, max);
        self.zoom = self.zoom.clamp(min, max);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.zoom_limits.0, self.zoom_limits.1);
    }

    /// Multiplicative wheel zoom, one 1.1x step per scroll notch.
    /// Scroll up (positive delta) zooms in.
    pub fn apply_scroll_zoom(&mut self, scroll_delta: f32) {
        const ZOOM_STEP: f32 = 1.1;
        if scroll_delta > 0.0 {
            self.set_zoom(self.zoom * ZOOM_STEP);
        } else if scroll_delta < 0.0 {
            self.set_zoom(self.zoom / ZOOM_STEP);
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn virtual_size(&self) -> (f32, f32) {
        (self.virtual_width, self.virtual_height)
    }

    pub fn view_size(&self) -> PhysicalSize<u32> {
        self.view_size
    }

    /// Orthographic projection symmetric about `position`. Dividing by
    /// zoom is the defined semantic: zoom > 1 spans less world.
    pub fn projection(&self) -> Mat4 {
        let (half_width, half_height) =
            self.half_extents().unwrap_or((self.virtual_width * 0.5, self.virtual_height * 0.5));
        Mat4::orthographic_rh_gl(
            self.position.x - half_width,
            self.position.x + half_width,
            self.position.y - half_height,
            self.position.y + half_height,
            -1.0,
            1.0,
        )
    }

    /// World-space half extents of the visible rect, or None while the
    /// viewport is degenerate (minimized window).
    pub fn half_extents(&self) -> Option<(f32, f32)> {
        if self.view_size.width == 0 || self.view_size.height == 0 {
            return None;
        }
        let aspect = self.view_size.width as f32 / self.view_size.height as f32;
        let half_height = (self.virtual_height * 0.5) / self.zoom;
        let half_width = half_height * aspect;
        Some((half_width, half_height))
    }

    /// Converts a viewport pixel position (y down, origin top-left) to
    /// world space by inverting the projection.
    pub fn screen_to_world(&self, screen: Vec2) -> Option<Vec2> {
        if self.view_size.width == 0 || self.view_size.height == 0 {
            return None;
        }
        let inv = self.projection().inverse();
        let ndc_x = (screen.x / self.view_size.width as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - (screen.y / self.view_size.height as f32) * 2.0;
        let world = inv * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        if world.w.abs() <= f32::EPSILON {
            return None;
        }
        let world = world / world.w;
        Some(Vec2::new(world.x, world.y))
    }

    pub fn world_to_screen(&self, world: Vec2) -> Option<Vec2> {
        if self.view_size.width == 0 || self.view_size.height == 0 {
            return None;
        }
        let clip = self.projection() * Vec4::new(world.x, world.y, 0.0, 1.0);
        if clip.w.abs() <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * self.view_size.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * self.view_size.height as f32;
        Some(Vec2::new(x, y))
    }
}
