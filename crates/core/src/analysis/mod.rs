use std::{collections::VecDeque, f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::AudioConfig, Result, SphereVizError};

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;
const BLACKMAN_ALPHA: f32 = 0.16;

/// Spectrum analyser modelled on a browser `AnalyserNode`.
///
/// Keeps the most recent `fft_size` samples and derives the two views the
/// level meter reads: raw time-domain samples and smoothed, dB-scaled
/// frequency magnitudes quantised to bytes.
pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    window: Vec<f32>,
    fft: FftResources,
}

impl Analyser {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(SphereVizError::InvalidInput(
                "fft size must be a power of two between 32 and 32768",
            ));
        }
        if config.min_decibels >= config.max_decibels {
            return Err(SphereVizError::InvalidInput(
                "min decibels must be below max decibels",
            ));
        }

        let mut planner = RealFftPlanner::new();
        let plan = planner.plan_fft_forward(fft_size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            fft_size,
            smoothing: config.smoothing_time_constant.clamp(0.0, 1.0),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            samples: VecDeque::from(vec![0.0; fft_size]),
            smoothed: vec![0.0; fft_size / 2],
            window: blackman_window(fft_size),
            fft,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of usable frequency bins, half the FFT size.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends captured samples, keeping only the latest `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.fft_size);
        for sample in &samples[skip..] {
            if self.samples.len() == self.fft_size {
                self.samples.pop_front();
            }
            self.samples.push_back(*sample);
        }
    }

    /// Clears captured samples and smoothing history.
    pub fn reset(&mut self) {
        self.samples.iter_mut().for_each(|sample| *sample = 0.0);
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
    }

    /// Copies the current window of samples into `out`.
    pub fn float_time_domain_data(&self, out: &mut [f32]) {
        for (slot, sample) in out.iter_mut().zip(self.samples.iter()) {
            *slot = *sample;
        }
    }

    /// Computes byte frequency data for the current window into `out`.
    ///
    /// Each call advances the temporal smoothing by one step.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        self.process_spectrum()?;

        let range = self.max_decibels - self.min_decibels;
        for (slot, magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            let decibels = if *magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = (255.0 / range) * (decibels - self.min_decibels);
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }

        Ok(())
    }

    fn process_spectrum(&mut self) -> Result<()> {
        let fft = &mut self.fft;
        for ((input, sample), weight) in fft
            .input
            .iter_mut()
            .zip(self.samples.iter())
            .zip(self.window.iter())
        {
            *input = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 1.0 / self.fft_size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(fft.spectrum.iter()) {
            let magnitude = bin.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
        }

        Ok(())
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn blackman_window(len: usize) -> Vec<f32> {
    let a0 = 0.5 * (1.0 - BLACKMAN_ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * BLACKMAN_ALPHA;
    (0..len)
        .map(|n| {
            let x = n as f32 / len as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
