use crate::{scene::SphereUniforms, sizes::SurfaceSize, Result};

/// Rendering backend seam. A GPU backend uploads the uniforms and draws the
/// sphere; [`FrameRecorder`] keeps them for inspection instead.
pub trait RenderSurface {
    fn resize(&mut self, size: &SurfaceSize);

    fn render(&mut self, uniforms: &SphereUniforms) -> Result<()>;
}

/// Headless surface that records what each frame would have drawn.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    size: Option<SurfaceSize>,
    frames: Vec<SphereUniforms>,
    capacity: Option<usize>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` frames, dropping the oldest.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn size(&self) -> Option<SurfaceSize> {
        self.size
    }

    pub fn frames(&self) -> &[SphereUniforms] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&SphereUniforms> {
        self.frames.last()
    }
}

impl RenderSurface for FrameRecorder {
    fn resize(&mut self, size: &SurfaceSize) {
        self.size = Some(*size);
    }

    fn render(&mut self, uniforms: &SphereUniforms) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.frames.len() == capacity {
                self.frames.remove(0);
            }
        }
        self.frames.push(uniforms.clone());
        Ok(())
    }
}
