use crate::{config::ViewportConfig, events::EventEmitter};

/// Payload of the `resize` event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub pixel_ratio: f32,
}

impl SurfaceSize {
    pub const RESIZE: &'static str = "resize";

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Viewport-size notifier.
#[derive(Debug)]
pub struct Sizes {
    current: SurfaceSize,
    max_pixel_ratio: f32,
    events: EventEmitter<SurfaceSize>,
}

impl Sizes {
    pub fn new(config: &ViewportConfig) -> Self {
        let max_pixel_ratio = config.max_pixel_ratio.max(1.0);
        Self {
            current: SurfaceSize {
                width: config.width,
                height: config.height,
                viewport_width: config.width,
                viewport_height: config.height,
                pixel_ratio: config.device_pixel_ratio.clamp(1.0, max_pixel_ratio),
            },
            max_pixel_ratio,
            events: EventEmitter::new(),
        }
    }

    pub fn events(&self) -> &EventEmitter<SurfaceSize> {
        &self.events
    }

    pub fn current(&self) -> SurfaceSize {
        self.current
    }

    /// Records a new window size and emits `resize`. The pixel ratio is
    /// clamped to `[1, max_pixel_ratio]`.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.current = SurfaceSize {
            width,
            height,
            viewport_width: width,
            viewport_height: height,
            pixel_ratio: device_pixel_ratio.clamp(1.0, self.max_pixel_ratio),
        };
        tracing::debug!(width, height, pixel_ratio = self.current.pixel_ratio, "viewport resized");
        self.events.trigger(SurfaceSize::RESIZE, &self.current);
    }
}
