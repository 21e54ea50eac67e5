//! View state: zoom, image center, visible bounds, and the mip rule.
//!
//! The tracker is a pure state machine. Gestures (pan, wheel zoom, pinch,
//! zoom-to-region) mutate zoom and center, after which the caller asks for
//! fresh bounds and hands them to the request coordinator. Continuous
//! gestures are rate-limited with [`Debouncer`], which takes explicit
//! timestamps so it can be driven by a test clock.

use std::time::{Duration, Instant};

/// Smallest representable zoom. Keeps `1/zoom` finite everywhere downstream.
pub const MIN_ZOOM: f64 = 1e-6;

/// Quiet period after the last gesture before a region re-evaluation fires.
pub const GESTURE_DEBOUNCE: Duration = Duration::from_millis(200);

/// A rectangle in full-resolution image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Bounds {
    /// Whether `other` lies fully inside `self` on both axes.
    pub fn contains(&self, other: &Bounds) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.w <= self.x + self.w
            && other.y + other.h <= self.y + self.h
    }
}

/// Decimation factor for a zoom level.
///
/// `mip_exact = max(1, 1/zoom)`, rounded down when its fractional part is
/// below 0.25 and up otherwise. The asymmetric rounding keeps the mip stable
/// when the zoom hovers just past an integer boundary.
pub fn calculate_mip(zoom: f64) -> i32 {
    let mip_exact = (1.0 / zoom.max(MIN_ZOOM)).max(1.0);
    let rounded = if mip_exact.fract() < 0.25 {
        mip_exact.floor()
    } else {
        mip_exact.ceil()
    };
    (rounded as i32).max(1)
}

/// Tracks where the viewer is looking and how far it is zoomed.
#[derive(Debug, Clone)]
pub struct ViewStateTracker {
    image_width: u64,
    image_height: u64,
    canvas_width: u32,
    canvas_height: u32,
    zoom: f64,
    center_x: f64,
    center_y: f64,
}

impl ViewStateTracker {
    /// Start centered on the image at a zoom that fits it on the canvas.
    pub fn new(image_width: u64, image_height: u64, canvas_width: u32, canvas_height: u32) -> Self {
        let fit_x = canvas_width as f64 / image_width.max(1) as f64;
        let fit_y = canvas_height as f64 / image_height.max(1) as f64;
        Self {
            image_width,
            image_height,
            canvas_width,
            canvas_height,
            zoom: fit_x.min(fit_y).max(MIN_ZOOM),
            center_x: image_width as f64 / 2.0,
            center_y: image_height as f64 / 2.0,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }

    pub fn mip(&self) -> i32 {
        calculate_mip(self.zoom)
    }

    /// Set the zoom level directly, respecting the positive floor.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.max(MIN_ZOOM);
    }

    /// Multiply the zoom, as a mouse-wheel or pinch step does.
    pub fn zoom_by(&mut self, factor: f64) {
        self.set_zoom(self.zoom * factor);
    }

    /// Shift the image center by a screen-pixel delta.
    pub fn pan(&mut self, screen_dx: f64, screen_dy: f64) {
        self.center_x += screen_dx / self.zoom;
        self.center_y += screen_dy / self.zoom;
    }

    /// Center on and zoom to a dragged-out image rectangle.
    pub fn zoom_to_region(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        self.center_x = x + w / 2.0;
        self.center_y = y + h / 2.0;
        let zx = self.canvas_width as f64 / w;
        let zy = self.canvas_height as f64 / h;
        self.set_zoom(zx.min(zy));
    }

    /// Resize the canvas, e.g. on a window resize.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas_width = width;
        self.canvas_height = height;
    }

    /// The visible world-rectangle, clamped to the image.
    pub fn bounds(&self) -> Bounds {
        let view_w = (self.canvas_width as f64 / self.zoom).min(self.image_width as f64);
        let view_h = (self.canvas_height as f64 / self.zoom).min(self.image_height as f64);

        let x = (self.center_x - view_w / 2.0)
            .clamp(0.0, self.image_width as f64 - view_w);
        let y = (self.center_y - view_h / 2.0)
            .clamp(0.0, self.image_height as f64 - view_h);

        Bounds {
            x: x.floor() as i64,
            y: y.floor() as i64,
            w: view_w.floor() as i64,
            h: view_h.floor() as i64,
        }
    }
}

/// Trailing-edge debounce over an explicit clock.
///
/// Each [`Debouncer::trigger`] pushes the deadline out by the configured
/// delay; [`Debouncer::fire_due`] reports (once) when the quiet period has
/// elapsed.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Record a gesture at `now`, restarting the quiet period.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Whether the quiet period has elapsed. Consumes the pending deadline.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a gesture is waiting to fire.
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(GESTURE_DEBOUNCE)
    }
}
