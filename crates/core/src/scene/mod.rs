use std::{
    cell::{Ref, RefCell},
    f32::consts::PI,
    rc::Rc,
};

use glam::{Vec2, Vec3};

use crate::{
    events::unique_namespace,
    mapping::Variations,
    resources::{Resources, ResourcesEvent},
};

/// Group whose completion triggers building the sphere.
pub const BASE_GROUP: &str = "base";

/// Geometry subdivision of the sphere mesh.
pub const SUBDIVISION: u32 = 512;

/// A directional light feeding the sphere shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Linear RGB in `0..=1`.
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
}

impl Light {
    fn new(rgb: u32, intensity: f32, phi: f32, theta: f32) -> Self {
        Self {
            color: color_from_hex(rgb),
            intensity,
            position: from_spherical(1.0, phi, theta),
        }
    }
}

/// Uniform block consumed by the sphere shader.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereUniforms {
    pub light_a: Light,
    pub light_b: Light,
    pub subdivision: Vec2,
    pub offset: Vec3,
    pub distortion_frequency: f32,
    pub distortion_strength: f32,
    pub displacement_frequency: f32,
    pub displacement_strength: f32,
    pub fresnel_offset: f32,
    pub fresnel_multiplier: f32,
    pub fresnel_power: f32,
    pub time: f32,
}

impl Default for SphereUniforms {
    fn default() -> Self {
        Self {
            light_a: Light::new(0xff3e00, 1.85, 0.785, -2.356),
            light_b: Light::new(0x0063ff, 1.4, 2.561, -1.844),
            subdivision: Vec2::splat(SUBDIVISION as f32),
            offset: Vec3::ZERO,
            distortion_frequency: 1.5,
            distortion_strength: 0.65,
            displacement_frequency: 2.12,
            displacement_strength: 0.152,
            fresnel_offset: -1.609,
            fresnel_multiplier: 3.587,
            fresnel_power: 1.793,
            time: 0.0,
        }
    }
}

/// Audio-reactive sphere.
#[derive(Debug, Clone, Default)]
pub struct Sphere {
    variations: Variations,
    uniforms: SphereUniforms,
    time_frequency: f32,
}

impl Sphere {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniforms(&self) -> &SphereUniforms {
        &self.uniforms
    }

    pub fn variations(&self) -> &Variations {
        &self.variations
    }

    pub fn time_frequency(&self) -> f32 {
        self.time_frequency
    }

    /// Eases the variations towards `levels` (defaults when `None`) and
    /// advances the shader time and noise offset by one frame.
    pub fn update(&mut self, levels: Option<&[f32]>, delta_ms: f32) {
        self.variations.update(levels, delta_ms);

        self.time_frequency = self.variations.low_level.current;
        let elapsed_time = delta_ms * self.time_frequency;

        let uniforms = &mut self.uniforms;
        uniforms.displacement_strength = self.variations.volume.current;
        uniforms.distortion_strength = self.variations.high_level.current;
        uniforms.fresnel_multiplier = self.variations.medium_level.current;

        // Slowly wandering direction for the noise offset.
        let offset_time = elapsed_time * 0.3;
        let phi = ((offset_time * 0.001).sin() * (offset_time * 0.00321).sin() * 0.5 + 0.5) * PI;
        let theta =
            ((offset_time * 0.0001).sin() * (offset_time * 0.000321).sin() * 0.5 + 0.5) * PI * 2.0;
        let direction = from_spherical(1.0, phi, theta) * (self.time_frequency * 2.0);

        uniforms.offset += direction;
        uniforms.time += elapsed_time;
    }
}

/// Owns the sphere once the `base` group has loaded.
#[derive(Debug)]
pub struct World {
    sphere: Rc<RefCell<Option<Sphere>>>,
    namespace: String,
}

impl World {
    /// Subscribes to `groupEnd` under a namespace of its own.
    pub fn new(resources: &Resources) -> Self {
        let world = Self {
            sphere: Rc::default(),
            namespace: unique_namespace("world"),
        };
        let sphere = Rc::downgrade(&world.sphere);

        resources
            .events()
            .on(&format!("groupEnd.{}", world.namespace), move |event: &ResourcesEvent| {
                let ResourcesEvent::GroupEnd { group: Some(group) } = event else {
                    return;
                };
                if group.name != BASE_GROUP {
                    return;
                }
                if let Some(sphere) = sphere.upgrade() {
                    let mut slot = sphere.borrow_mut();
                    if slot.is_none() {
                        tracing::info!("base group loaded, building sphere");
                        *slot = Some(Sphere::new());
                    }
                }
            });

        world
    }

    /// Removes the `groupEnd` subscription; a world rebuilt against the same
    /// resources should detach the old one first.
    pub fn detach(&self, resources: &Resources) {
        resources.events().off(&format!("{}.", self.namespace));
    }

    pub fn has_sphere(&self) -> bool {
        self.sphere.borrow().is_some()
    }

    pub fn sphere(&self) -> Ref<'_, Option<Sphere>> {
        self.sphere.borrow()
    }

    /// Current uniforms, if the sphere exists.
    pub fn uniforms(&self) -> Option<SphereUniforms> {
        self.sphere
            .borrow()
            .as_ref()
            .map(|sphere| sphere.uniforms().clone())
    }

    pub fn update(&self, levels: Option<&[f32]>, delta_ms: f32) {
        if let Some(sphere) = self.sphere.borrow_mut().as_mut() {
            sphere.update(levels, delta_ms);
        }
    }
}

/// Converts spherical coordinates (polar `phi` from +Y, azimuth `theta`
/// around +Y from +Z) to a cartesian position.
pub fn from_spherical(radius: f32, phi: f32, theta: f32) -> Vec3 {
    let sin_phi_radius = phi.sin() * radius;
    Vec3::new(
        sin_phi_radius * theta.sin(),
        phi.cos() * radius,
        sin_phi_radius * theta.cos(),
    )
}

fn color_from_hex(rgb: u32) -> Vec3 {
    let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
    Vec3::new(channel(16), channel(8), channel(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loader::{Loader, Resource},
        resources::AssetGroup,
    };

    #[test]
    fn spherical_axes() {
        let up = from_spherical(1.0, 0.0, 0.0);
        assert!((up - Vec3::Y).length() < 1e-6);

        let forward = from_spherical(2.0, PI / 2.0, 0.0);
        assert!((forward - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn default_lights() {
        let uniforms = SphereUniforms::default();
        assert_eq!(uniforms.light_a.color, Vec3::new(1.0, 62.0 / 255.0, 0.0));
        assert_eq!(uniforms.light_b.intensity, 1.4);
        assert!((uniforms.light_a.position.length() - 1.0).abs() < 1e-5);
        assert_eq!(uniforms.subdivision, Vec2::splat(512.0));
    }

    #[test]
    fn update_accumulates_time_and_offset() {
        let mut sphere = Sphere::new();

        sphere.update(None, 16.0);
        let first_time = sphere.uniforms().time;
        sphere.update(None, 16.0);

        assert!(first_time > 0.0);
        assert_eq!(sphere.time_frequency(), sphere.variations().low_level.current);
        assert!(sphere.uniforms().time > first_time);
        assert!(sphere.uniforms().offset.length() > 0.0);
        assert_eq!(
            sphere.uniforms().displacement_strength,
            sphere.variations().volume.current
        );
    }

    #[test]
    fn loud_levels_raise_displacement() {
        let mut quiet = Sphere::new();
        let mut loud = Sphere::new();

        for _ in 0..10 {
            quiet.update(Some(&[0.0; 8]), 16.0);
            loud.update(Some(&[0.9; 8]), 16.0);
        }

        assert!(loud.uniforms().displacement_strength > quiet.uniforms().displacement_strength);
        assert!(loud.uniforms().fresnel_multiplier > quiet.uniforms().fresnel_multiplier);
    }

    #[test]
    fn builds_sphere_only_after_base_group() {
        let loader = Rc::new(Loader::new(Vec::new()));
        let resources = Resources::new(
            vec![
                AssetGroup::new("intro", Vec::new()),
                AssetGroup::new(BASE_GROUP, Vec::new()),
            ],
            loader,
        );
        let world = World::new(&resources);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let probe = Rc::clone(&world.sphere);
        resources
            .events()
            .on("groupEnd.probe", move |event: &ResourcesEvent| {
                if let ResourcesEvent::GroupEnd { group: Some(group) } = event {
                    sink.borrow_mut()
                        .push((group.name.clone(), probe.borrow().is_some()));
                }
            });

        assert!(!world.has_sphere());
        resources.start();

        assert!(world.has_sphere());
        assert!(world.sphere().as_ref().is_some_and(|sphere| sphere.time_frequency() == 0.0));
        assert_eq!(
            *seen.borrow(),
            vec![("intro".to_string(), false), ("base".to_string(), true)]
        );
    }

    #[test]
    fn detached_world_ignores_later_groups() {
        let loader = Rc::new(Loader::new(Vec::new()));
        let resources = Resources::new(vec![AssetGroup::new(BASE_GROUP, Vec::new())], loader);
        let stale = World::new(&resources);
        let world = World::new(&resources);

        stale.detach(&resources);
        resources.start();

        assert!(!stale.has_sphere());
        assert!(world.has_sphere());
        assert_eq!(
            resources.events().namespaces(),
            vec!["base".to_string(), world.namespace.clone()]
        );
    }

    #[test]
    fn unloaded_base_leaves_world_empty() {
        let loader = Rc::new(Loader::new(Vec::new()));
        let resources = Resources::new(
            vec![AssetGroup::new(
                BASE_GROUP,
                vec![Resource::new("env", "env.hdr", "texture")],
            )],
            loader,
        );
        let world = World::new(&resources);

        resources.start();
        world.update(None, 16.0);

        assert!(!world.has_sphere());
        assert!(world.uniforms().is_none());
    }
}
