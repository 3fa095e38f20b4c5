use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::Key;

/// Typed input events pushed by the windowing collaborator. Keeps raw
/// window handles and callbacks out of the editing core.
pub enum InputEvent {
    Key { key: Key, pressed: bool },
    MouseButton { button: MouseButton, pressed: bool },
    CursorPos { x: f32, y: f32 },
    Wheel { delta: f32 },
    Other,
}

impl InputEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                InputEvent::Wheel { delta: d }
            }
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                InputEvent::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            _ => InputEvent::Other,
        }
    }
}

/// Per-frame aggregated input state. Clicks are edge-triggered: a click
/// latches on the press transition and is drained once via `take_*`, so
/// a button held across frames acts exactly once.
#[derive(Default)]
pub struct Input {
    cursor_pos: Option<(f32, f32)>,
    wheel: f32,
    left_held: bool,
    left_clicked: bool,
    right_held: bool,
    right_clicked: bool,
    middle_held: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ev: InputEvent) {
        match ev {
            InputEvent::MouseButton { button, pressed } => match button {
                MouseButton::Left => {
                    if pressed && !self.left_held {
                        self.left_clicked = true;
                    }
                    self.left_held = pressed;
                }
                MouseButton::Right => {
                    if pressed && !self.right_held {
                        self.right_clicked = true;
                    }
                    self.right_held = pressed;
                }
                MouseButton::Middle => {
                    self.middle_held = pressed;
                }
                _ => {}
            },
            InputEvent::CursorPos { x, y } => {
                self.cursor_pos = Some((x, y));
            }
            InputEvent::Wheel { delta } => {
                self.wheel += delta;
            }
            InputEvent::Key { .. } | InputEvent::Other => {}
        }
    }

    pub fn cursor_position(&self) -> Option<(f32, f32)> {
        self.cursor_pos
    }

    pub fn take_left_click(&mut self) -> bool {
        let was = self.left_clicked;
        self.left_clicked = false;
        was
    }

    pub fn take_right_click(&mut self) -> bool {
        let was = self.right_clicked;
        self.right_clicked = false;
        was
    }

    pub fn middle_held(&self) -> bool {
        self.middle_held
    }

    pub fn consume_wheel_delta(&mut self) -> Option<f32> {
        if self.wheel.abs() > 0.0 {
            let d = self.wheel;
            self.wheel = 0.0;
            Some(d)
        } else {
            None
        }
    }

    /// Drops per-frame latches. Held-state (buttons down, cursor pos)
    /// persists across frames.
    pub fn clear_frame(&mut self) {
        self.wheel = 0.0;
        self.left_clicked = false;
        self.right_clicked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(button: MouseButton) -> InputEvent {
        InputEvent::MouseButton { button, pressed: true }
    }

    fn release(button: MouseButton) -> InputEvent {
        InputEvent::MouseButton { button, pressed: false }
    }

    #[test]
    fn click_fires_once_per_press_edge() {
        let mut input = Input::new();
        input.push(press(MouseButton::Left));
        assert!(input.take_left_click());
        assert!(!input.take_left_click());

        // Still held next frame: no new click.
        input.push(press(MouseButton::Left));
        assert!(!input.take_left_click());

        input.push(release(MouseButton::Left));
        input.push(press(MouseButton::Left));
        assert!(input.take_left_click());
    }

    #[test]
    fn middle_button_is_level_triggered() {
        let mut input = Input::new();
        input.push(press(MouseButton::Middle));
        assert!(input.middle_held());
        input.clear_frame();
        assert!(input.middle_held());
        input.push(release(MouseButton::Middle));
        assert!(!input.middle_held());
    }

    #[test]
    fn wheel_accumulates_until_consumed() {
        let mut input = Input::new();
        input.push(InputEvent::Wheel { delta: 1.0 });
        input.push(InputEvent::Wheel { delta: 0.5 });
        assert_eq!(input.consume_wheel_delta(), Some(1.5));
        assert_eq!(input.consume_wheel_delta(), None);
    }

    #[test]
    fn clear_frame_drops_pending_click() {
        let mut input = Input::new();
        input.push(press(MouseButton::Right));
        input.clear_frame();
        assert!(!input.take_right_click());
    }
}
