use std::time::{Duration, Instant};

use crate::{config::TimeConfig, events::EventEmitter};

/// Payload of the `tick` event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Clamped time since the previous tick.
    pub delta: Duration,
    /// Time spent playing since the clock started.
    pub elapsed: Duration,
}

impl FrameTick {
    pub const TICK: &'static str = "tick";
}

/// Frame clock driven by the host's frame pacing.
#[derive(Debug)]
pub struct Time {
    start: Instant,
    current: Instant,
    delta: Duration,
    elapsed: Duration,
    max_delta: Duration,
    playing: bool,
    events: EventEmitter<FrameTick>,
}

impl Time {
    pub fn new(config: &TimeConfig) -> Self {
        Self::starting_at(Instant::now(), config)
    }

    pub fn starting_at(start: Instant, config: &TimeConfig) -> Self {
        Self {
            start,
            current: start,
            delta: Duration::from_millis(config.initial_delta_ms),
            elapsed: Duration::ZERO,
            max_delta: Duration::from_millis(config.max_delta_ms),
            playing: true,
            events: EventEmitter::new(),
        }
    }

    pub fn events(&self) -> &EventEmitter<FrameTick> {
        &self.events
    }

    /// Advances the clock to `now` and emits `tick` while playing.
    ///
    /// Elapsed time accumulates the raw delta; the stored delta is clamped
    /// afterwards so a stalled frame cannot make eased values jump.
    pub fn tick(&mut self, now: Instant) {
        let delta = now.saturating_duration_since(self.current);
        if self.playing {
            self.elapsed += delta;
        }
        self.current = now;
        self.delta = delta.min(self.max_delta);

        if self.playing {
            self.events.trigger(
                FrameTick::TICK,
                &FrameTick {
                    delta: self.delta,
                    elapsed: self.elapsed,
                },
            );
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Delta in milliseconds, the unit the easing rates are tuned for.
    pub fn delta_ms(&self) -> f32 {
        self.delta.as_secs_f32() * 1000.0
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn started_at(&self) -> Instant {
        self.start
    }
}
