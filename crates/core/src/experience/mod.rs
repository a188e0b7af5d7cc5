//! Frame-loop owner tying the subsystems together.

use std::{rc::Rc, time::Instant};

use crate::{
    audio::{AudioInput, Microphone},
    config::AppConfig,
    loader::{ExtensionHandler, Loader},
    render::RenderSurface,
    resources::Resources,
    scene::World,
    sizes::Sizes,
    time::Time,
    Result,
};

/// Owns every subsystem and the render surface.
#[derive(Debug)]
pub struct Experience<S: RenderSurface> {
    config: AppConfig,
    time: Time,
    sizes: Sizes,
    resources: Resources,
    microphone: Microphone,
    world: World,
    surface: S,
    frame: u64,
}

impl<S: RenderSurface> Experience<S> {
    pub fn new(config: AppConfig, handlers: Vec<ExtensionHandler>, surface: S) -> Self {
        Self::starting_at(Instant::now(), config, handlers, surface)
    }

    pub fn starting_at(
        start: Instant,
        config: AppConfig,
        handlers: Vec<ExtensionHandler>,
        mut surface: S,
    ) -> Self {
        let loader = Rc::new(Loader::with_join_policy(handlers, config.loader.join));
        let resources = Resources::new(config.assets.clone(), loader);
        let world = World::new(&resources);
        let sizes = Sizes::new(&config.viewport);
        surface.resize(&sizes.current());

        Self {
            time: Time::starting_at(start, &config.time),
            microphone: Microphone::new(&config.audio),
            sizes,
            resources,
            world,
            surface,
            config,
            frame: 0,
        }
    }

    /// Starts loading the configured asset groups.
    pub fn start(&self) {
        tracing::info!(groups = self.config.assets.len(), "starting experience");
        self.resources.start();
    }

    pub fn attach_microphone(&mut self, input: AudioInput) -> Result<()> {
        self.microphone.attach(input)
    }

    /// Runs one frame: applies finished loads, advances the clock, and while
    /// playing updates the microphone and sphere and renders.
    pub fn update(&mut self, now: Instant) -> Result<()> {
        self.resources.loader().pump();
        self.time.tick(now);
        if !self.time.is_playing() {
            return Ok(());
        }

        self.microphone.update()?;
        let levels = self
            .microphone
            .is_ready()
            .then(|| self.microphone.levels());
        let delta_ms = self.time.delta_ms();
        self.world.update(levels, delta_ms);

        if self.config.debug {
            tracing::debug!(
                frame = self.frame,
                delta_ms,
                volume = self.microphone.volume(),
                "frame"
            );
        }
        self.frame += 1;

        match self.world.uniforms() {
            Some(uniforms) => self.surface.render(&uniforms),
            None => Ok(()),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.sizes.resize(width, height, device_pixel_ratio);
        self.surface.resize(&self.sizes.current());
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut Time {
        &mut self.time
    }

    pub fn sizes(&self) -> &Sizes {
        &self.sizes
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn microphone(&self) -> &Microphone {
        &self.microphone
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Frames rendered or skipped while playing.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}
