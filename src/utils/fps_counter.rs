#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Frame rate measured over one-second windows.
///
/// The effect system feeds it once per processed frame; the latest value is
/// exposed to shaders as the `fps` uniform.
pub struct FpsCounter {
    last_tick: Instant,
    frames_in_window: u32,
    window: Duration,
    current_fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            frames_in_window: 0,
            window: Duration::ZERO,
            current_fps: 0.0,
        }
    }

    /// Records a frame. Returns the new rate when a window completes.
    pub fn tick(&mut self) -> Option<f32> {
        let now = Instant::now();
        self.record(now - self.last_tick);
        self.last_tick = now;
        (self.frames_in_window == 0).then_some(self.current_fps)
    }

    /// Accounts one frame that took `delta`.
    fn record(&mut self, delta: Duration) {
        self.frames_in_window += 1;
        self.window += delta;

        if self.window >= Self::WINDOW {
            self.current_fps = self.frames_in_window as f32 / self.window.as_secs_f32();
            self.window = Duration::ZERO;
            self.frames_in_window = 0;
        }
    }

    #[inline]
    #[must_use]
    pub fn fps(&self) -> f32 {
        self.current_fps
    }
}
