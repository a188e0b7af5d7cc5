//! Eased audio-to-parameter mappings for the sphere.

/// Which audio value a [`Variation`] follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationSource {
    /// Loudest of the three lowest bands.
    Volume,
    LowLevel,
    MediumLevel,
    HighLevel,
}

impl VariationSource {
    /// Target value derived from the current band levels.
    pub fn value(self, levels: &[f32]) -> f32 {
        let level = |index: usize| levels.get(index).copied().unwrap_or(0.0);
        match self {
            Self::Volume => level(0).max(level(1)).max(level(2)) * 0.3,
            Self::LowLevel => (level(0) * 0.003 + 0.0001).max(0.0),
            Self::MediumLevel => (level(1) * 2.0 + 3.587).max(3.587),
            Self::HighLevel => (level(2) * 5.0 + 0.5).max(0.5),
        }
    }

    /// Target used while no microphone is available.
    pub fn default_value(self) -> f32 {
        match self {
            Self::Volume => 0.152,
            Self::LowLevel => 0.0003,
            Self::MediumLevel => 3.587,
            Self::HighLevel => 0.65,
        }
    }
}

/// A value that eases towards its target at separate rising and falling rates.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub source: VariationSource,
    pub target: f32,
    pub current: f32,
    pub up_easing: f32,
    pub down_easing: f32,
}

impl Variation {
    pub fn new(source: VariationSource, up_easing: f32, down_easing: f32) -> Self {
        Self {
            source,
            target: 0.0,
            current: 0.0,
            up_easing,
            down_easing,
        }
    }

    /// Retargets from `levels` (or the default when `None`) and eases
    /// `current` by `delta_ms` milliseconds.
    pub fn update(&mut self, levels: Option<&[f32]>, delta_ms: f32) {
        self.target = match levels {
            Some(levels) => self.source.value(levels),
            None => self.source.default_value(),
        };

        let easing = if self.target > self.current {
            self.up_easing
        } else {
            self.down_easing
        };
        self.current += (self.target - self.current) * easing * delta_ms;
    }
}

/// The four variations the sphere reads each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Variations {
    pub volume: Variation,
    pub low_level: Variation,
    pub medium_level: Variation,
    pub high_level: Variation,
}

impl Default for Variations {
    fn default() -> Self {
        Self {
            volume: Variation::new(VariationSource::Volume, 0.03, 0.002),
            low_level: Variation::new(VariationSource::LowLevel, 0.005, 0.002),
            medium_level: Variation::new(VariationSource::MediumLevel, 0.008, 0.004),
            high_level: Variation::new(VariationSource::HighLevel, 0.02, 0.001),
        }
    }
}

impl Variations {
    pub fn update(&mut self, levels: Option<&[f32]>, delta_ms: f32) {
        for variation in [
            &mut self.volume,
            &mut self.low_level,
            &mut self.medium_level,
            &mut self.high_level,
        ] {
            variation.update(levels, delta_ms);
        }
    }
}
