// SPDX-License-Identifier: MPL-2.0

//! Opacity tweens for showing and hiding overlays.

use std::time::{Duration, Instant};

/// Length of a show/hide crossfade.
pub const FADE_ANIMATION_TIME: Duration = Duration::from_secs(1);

/// Quadratic ease-out on `t` in `[0, 1]`.
#[must_use]
pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * (2.0 - t)
}

/// Tween between two opacities. The clock starts at the first
/// [`Fade::sample`], which is the first frame after the fade was scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct Fade {
    from: u8,
    to: u8,
    duration: Duration,
    started: Option<Instant>,
}

impl Fade {
    #[must_use]
    pub fn new(from: u8, to: u8, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            started: None,
        }
    }

    #[must_use]
    pub fn target(&self) -> u8 {
        self.to
    }

    /// Move the end point, keeping the clock.
    pub fn retarget(&mut self, to: u8) {
        self.to = to;
    }

    /// Opacity at `now`.
    pub fn sample(&mut self, now: Instant) -> u8 {
        let started = *self.started.get_or_insert(now);
        if self.duration.is_zero() {
            return self.to;
        }

        let t = now.saturating_duration_since(started).as_secs_f64() / self.duration.as_secs_f64();
        let eased = ease_out_quad(t);
        let value = f64::from(self.from) + (f64::from(self.to) - f64::from(self.from)) * eased;
        value.round().clamp(0.0, 255.0) as u8
    }

    #[must_use]
    pub fn is_finished(&self, now: Instant) -> bool {
        self.started
            .is_some_and(|started| now.saturating_duration_since(started) >= self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_is_monotonic_and_bounded() {
        assert_eq!(ease_out_quad(0.0), 0.0);
        assert_eq!(ease_out_quad(0.5), 0.75);
        assert_eq!(ease_out_quad(1.0), 1.0);
        assert_eq!(ease_out_quad(3.0), 1.0);
    }

    #[test]
    fn fade_starts_on_first_sample() {
        let mut fade = Fade::new(0, 200, FADE_ANIMATION_TIME);
        let t0 = Instant::now();

        assert!(!fade.is_finished(t0 + Duration::from_secs(10)));
        assert_eq!(fade.sample(t0), 0);
        assert_eq!(fade.sample(t0 + Duration::from_millis(500)), 150);
        assert!(!fade.is_finished(t0 + Duration::from_millis(999)));
        assert_eq!(fade.sample(t0 + FADE_ANIMATION_TIME), 200);
        assert!(fade.is_finished(t0 + FADE_ANIMATION_TIME));
    }

    #[test]
    fn fade_out_and_retarget() {
        let mut fade = Fade::new(255, 0, FADE_ANIMATION_TIME);
        let t0 = Instant::now();
        fade.sample(t0);

        fade.retarget(100);
        assert_eq!(fade.sample(t0 + FADE_ANIMATION_TIME), 100);
    }
}
