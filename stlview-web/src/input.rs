//! Browser event translation that does not need a DOM

use stlview_core::{LoadError, OrbitInput, ViewerError};

/// Tracks a primary-button drag across mouse events
#[derive(Debug, Default, Clone, Copy)]
pub struct DragTracker {
    last: Option<(i32, i32)>,
}

impl DragTracker {
    pub fn press(&mut self, button: i16, x: i32, y: i32) {
        if button == 0 {
            self.last = Some((x, y));
        }
    }

    /// Pointer moved to `(x, y)`; `held` is whether the primary button is
    /// still down (it may have been released outside the element)
    pub fn moved(&mut self, x: i32, y: i32, held: bool) -> Option<OrbitInput> {
        let (last_x, last_y) = self.last?;
        if !held {
            self.last = None;
            return None;
        }
        self.last = Some((x, y));
        let (dx, dy) = (x - last_x, y - last_y);
        if dx == 0 && dy == 0 {
            return None;
        }
        Some(OrbitInput::Rotate {
            dx: dx as f32,
            dy: dy as f32,
        })
    }

    pub fn release(&mut self) {
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }
}

/// Wheel scrolling down moves the camera away
pub fn wheel_input(delta_y: f64) -> Option<OrbitInput> {
    if delta_y == 0.0 || !delta_y.is_finite() {
        return None;
    }
    Some(OrbitInput::Dolly(delta_y.signum() as f32))
}

/// Map a finished HTTP response status onto a load failure
pub fn classify_status(status: u16, url: &str) -> Option<LoadError> {
    match status {
        200..=299 => None,
        404 | 410 => Some(LoadError::NotFound(url.to_string())),
        _ => Some(LoadError::Network(format!("HTTP {} fetching {}", status, url))),
    }
}

/// The `kind` string handed to the page's error callback
pub fn error_kind(err: &ViewerError) -> &'static str {
    match err {
        ViewerError::Load(load) => load.kind().as_str(),
        ViewerError::Configuration(_) => "ConfigurationError",
        ViewerError::Surface(_) => "SurfaceError",
        ViewerError::AlreadyInitialized | ViewerError::Destroyed => "StateError",
    }
}
