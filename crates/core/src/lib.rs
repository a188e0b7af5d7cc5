//! Core library for the audio-reactive sphere.
//!
//! The centre of the crate is a small event system ([`events`]) and the asset
//! pipeline built on it: an extension-routed [`Loader`] and a [`Resources`]
//! sequencer that loads named groups one after another. Around it sit the
//! frame clock, viewport sizes, the microphone analyser and the sphere whose
//! shader uniforms follow the audio levels.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod experience;
pub mod loader;
pub mod mapping;
pub mod render;
pub mod resources;
pub mod scene;
pub mod sizes;
pub mod time;

pub use analysis::Analyser;
pub use audio::{AudioInput, Microphone};
pub use config::{AppConfig, AudioConfig, LoaderConfig, TimeConfig, ViewportConfig};
pub use error::{Result, SphereVizError};
pub use events::EventEmitter;
pub use experience::Experience;
pub use loader::{
    Completion, ExtensionHandler, JoinPolicy, Loader, LoaderEvent, Payload, Resource, Texture,
};
pub use mapping::{Variation, VariationSource, Variations};
pub use render::{FrameRecorder, RenderSurface};
pub use resources::{AssetGroup, GroupPhase, Resources, ResourcesEvent};
pub use scene::{Sphere, SphereUniforms, World};
pub use sizes::{Sizes, SurfaceSize};
pub use time::{FrameTick, Time};
