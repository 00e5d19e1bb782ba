//! Fixed-timestep loop: the flight advances at a fixed rate while the planet
//! frame runs once per loop iteration.

use std::time::Instant;

/// Longest frame time accepted before the loop gives up catching up.
pub const MAX_FRAME_TIME: f64 = 0.25;

pub struct FrameLoop {
    dt: f64,
    previous_time: Instant,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl FrameLoop {
    /// A loop stepping the simulation `tick_hz` times per second.
    pub fn new(tick_hz: u32) -> Self {
        Self {
            dt: 1.0 / f64::from(tick_hz.max(1)),
            previous_time: Instant::now(),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Measure wall-clock time since the previous tick and [`advance`](Self::advance) by it.
    pub fn tick(&mut self, update_fn: impl FnMut(f64, f64), render_fn: impl FnMut(f64)) {
        let now = Instant::now();
        let frame_time = now.duration_since(self.previous_time).as_secs_f64();
        self.previous_time = now;
        self.advance(frame_time, update_fn, render_fn);
    }

    /// Run `update_fn(dt, sim_time)` for every whole step in the accumulated
    /// time, then `render_fn(alpha)` once.
    pub fn advance(
        &mut self,
        frame_time: f64,
        mut update_fn: impl FnMut(f64, f64),
        mut render_fn: impl FnMut(f64),
    ) {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            tracing::warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }
        self.accumulator += frame_time;

        while self.accumulator >= self.dt {
            update_fn(self.dt, self.total_sim_time);
            self.total_sim_time += self.dt;
            self.accumulator -= self.dt;
            self.update_count += 1;
        }

        render_fn(self.alpha());
        self.frame_count += 1;
    }

    /// Fraction of a step left in the accumulator, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / self.dt
        } else {
            0.0
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_per_frame() {
        let mut frame_loop = FrameLoop::new(60);
        let mut updates = 0u32;
        frame_loop.advance(3.0 / 60.0 + 1e-9, |_, _| updates += 1, |_| {});
        assert_eq!(updates, 3);
        assert!((frame_loop.total_sim_time() - 3.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_step_renders_with_alpha() {
        let mut frame_loop = FrameLoop::new(60);
        let mut updates = 0u32;
        let mut alpha = -1.0;
        frame_loop.advance(0.25 / 60.0, |_, _| updates += 1, |a| alpha = a);
        assert_eq!(updates, 0);
        assert!((alpha - 0.25).abs() < 1e-10, "{alpha}");
        assert_eq!(frame_loop.frame_count(), 1);
    }

    /// A stalled frame is clamped instead of replayed in full.
    #[test]
    fn test_long_frame_is_clamped() {
        let mut frame_loop = FrameLoop::new(30);
        let mut updates = 0u32;
        frame_loop.advance(2.0, |_, _| updates += 1, |_| {});
        let max_updates = (MAX_FRAME_TIME * 30.0).ceil() as u32;
        assert!(updates > 0 && updates <= max_updates, "{updates}");
    }

    #[test]
    fn test_negative_and_zero_frame_time() {
        let mut frame_loop = FrameLoop::new(0);
        assert_eq!(frame_loop.dt(), 1.0);
        frame_loop.advance(-1.0, |_, _| panic!("no step expected"), |_| {});
        frame_loop.advance(0.0, |_, _| panic!("no step expected"), |_| {});
        assert_eq!(frame_loop.update_count(), 0);
        assert_eq!(frame_loop.frame_count(), 2);
    }

    #[test]
    fn test_sim_time_tracks_updates() {
        let frame_times = [0.017, 0.015, 0.020, 0.016, 0.033, 0.008, 0.018];
        let mut frame_loop = FrameLoop::new(60);
        for &ft in &frame_times {
            frame_loop.advance(ft, |_, _| {}, |_| {});
        }
        let expected = frame_loop.update_count() as f64 * frame_loop.dt();
        assert!((frame_loop.total_sim_time() - expected).abs() < 1e-10);
        assert_eq!(frame_loop.frame_count(), frame_times.len() as u64);
    }
}
