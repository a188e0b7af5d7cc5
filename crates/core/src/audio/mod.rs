use std::sync::{Arc, Mutex, MutexGuard};

use crate::{config::AudioConfig, Analyser, Result, SphereVizError};

/// Shared, thread-safe entry point for captured audio.
///
/// A capture backend pushes samples from its own thread; the microphone reads
/// the analyser from the control thread once per frame.
#[derive(Clone)]
pub struct AudioInput {
    shared: Arc<Mutex<Analyser>>,
    sample_rate: u32,
}

impl AudioInput {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(SphereVizError::InvalidInput("sample rate must be positive"));
        }

        Ok(Self {
            shared: Arc::new(Mutex::new(Analyser::new(config)?)),
            sample_rate: config.sample_rate,
        })
    }

    /// Returns the sample rate the capture backend is expected to deliver.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Feeds a block of floating point samples into the analyser.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        self.lock()?.push_samples(samples);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Analyser>> {
        self.shared
            .lock()
            .map_err(|_| SphereVizError::msg("audio analyser has been poisoned"))
    }
}

impl std::fmt::Debug for AudioInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioInput")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Level meter over an [`AudioInput`].
///
/// Not ready until an input is attached; callers fall back to default values
/// until then.
#[derive(Debug)]
pub struct Microphone {
    input: Option<AudioInput>,
    level_count: usize,
    volume: f32,
    levels: Vec<f32>,
    time_domain: Vec<f32>,
    frequency: Vec<u8>,
}

impl Microphone {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input: None,
            level_count: config.level_count.max(1),
            volume: 0.0,
            levels: Vec::new(),
            time_domain: Vec::new(),
            frequency: Vec::new(),
        }
    }

    /// Connects a capture input; the microphone becomes ready.
    pub fn attach(&mut self, input: AudioInput) -> Result<()> {
        {
            let analyser = input.lock()?;
            self.time_domain = vec![0.0; analyser.fft_size()];
            // Sized to the FFT window; only the lower half receives bins, so
            // the upper half of the levels reads as silence.
            self.frequency = vec![0; analyser.fft_size()];
        }
        self.input = Some(input);
        tracing::info!(level_count = self.level_count, "microphone ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.input.is_some()
    }

    /// Refreshes the analyser buffers and recomputes volume and levels.
    pub fn update(&mut self) -> Result<()> {
        let Some(input) = &self.input else {
            return Ok(());
        };

        {
            let mut analyser = input.lock()?;
            analyser.byte_frequency_data(&mut self.frequency)?;
            analyser.float_time_domain_data(&mut self.time_domain);
        }

        self.volume = volume(&self.time_domain);
        self.levels = levels(&self.frequency, self.level_count);
        Ok(())
    }

    /// Root mean square of the latest time-domain window.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Normalised band levels, lowest frequencies first.
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn frequency_data(&self) -> &[u8] {
        &self.frequency
    }
}

/// Splits byte frequency data into `level_count` equal bands and returns
/// each band's mean divided by 256. Trailing bins that do not fill a band
/// are ignored.
pub fn levels(frequency: &[u8], level_count: usize) -> Vec<f32> {
    let level_count = level_count.max(1);
    let bins = frequency.len() / level_count;
    if bins == 0 {
        return vec![0.0; level_count];
    }

    frequency
        .chunks_exact(bins)
        .take(level_count)
        .map(|band| {
            let sum: u32 = band.iter().map(|value| u32::from(*value)).sum();
            sum as f32 / bins as f32 / 256.0
        })
        .collect()
}

pub fn volume(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_equal_bands() {
        let mut frequency = vec![0_u8; 16];
        frequency[..4].fill(128);
        frequency[4..8].fill(255);

        let levels = levels(&frequency, 4);

        assert_eq!(levels.len(), 4);
        assert!((levels[0] - 0.5).abs() < f32::EPSILON);
        assert!((levels[1] - 255.0 / 256.0).abs() < f32::EPSILON);
        assert_eq!(levels[2], 0.0);
    }

    #[test]
    fn too_few_bins_yield_silent_levels() {
        assert_eq!(levels(&[255, 255], 8), vec![0.0; 8]);
    }

    #[test]
    fn volume_is_rms() {
        assert!((volume(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < f32::EPSILON);
        assert_eq!(volume(&[]), 0.0);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let config = AudioConfig {
            sample_rate: 0,
            ..AudioConfig::default()
        };

        assert!(matches!(
            AudioInput::new(&config),
            Err(SphereVizError::InvalidInput(_))
        ));
    }

    #[test]
    fn unattached_microphone_stays_silent() {
        let mut microphone = Microphone::new(&AudioConfig::default());

        microphone.update().unwrap();

        assert!(!microphone.is_ready());
        assert!(microphone.levels().is_empty());
        assert_eq!(microphone.volume(), 0.0);
    }

    #[test]
    fn reads_samples_pushed_from_another_thread() {
        let config = AudioConfig::default();
        let input = AudioInput::new(&config).unwrap();
        let mut microphone = Microphone::new(&config);
        microphone.attach(input.clone()).unwrap();

        let producer = input.clone();
        std::thread::spawn(move || {
            let block: Vec<f32> = (0..256)
                .map(|i| (i as f32 * std::f32::consts::PI / 8.0).sin())
                .collect();
            producer.push_samples(&block).unwrap();
        })
        .join()
        .unwrap();

        microphone.update().unwrap();

        assert_eq!(microphone.levels().len(), 8);
        assert!(microphone.volume() > 0.5);
        assert!(microphone.levels()[0] > 0.0);
    }

    #[test]
    fn levels_span_the_whole_fft_window() {
        let config = AudioConfig::default();
        let input = AudioInput::new(&config).unwrap();
        let mut microphone = Microphone::new(&config);
        microphone.attach(input.clone()).unwrap();

        let noise: Vec<f32> = (0..256).map(|i| ((i * 7919) % 97) as f32 / 48.0 - 1.0).collect();
        input.push_samples(&noise).unwrap();
        microphone.update().unwrap();

        assert_eq!(microphone.frequency_data().len(), 256);
        assert!(microphone.frequency_data()[128..].iter().all(|byte| *byte == 0));
        assert!(microphone.levels()[4..].iter().all(|level| *level == 0.0));
    }
}
