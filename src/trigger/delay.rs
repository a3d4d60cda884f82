// src/trigger/delay.rs

//! Injected delay providers used for jitter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Zero-argument function returning a duration, sampled once per wait.
///
/// Cloning shares the underlying function.
#[derive(Clone)]
pub struct Delay {
    describe: Arc<str>,
    sample: Arc<dyn Fn() -> Duration + Send + Sync>,
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Delay").field(&self.describe).finish()
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe)
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::none()
    }
}

impl Delay {
    /// No jitter.
    pub fn none() -> Self {
        Self {
            describe: Arc::from("none"),
            sample: Arc::new(|| Duration::ZERO),
        }
    }

    /// Always the same extra delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            describe: Arc::from(format!("fixed {}ms", delay.as_millis())),
            sample: Arc::new(move || delay),
        }
    }

    /// Uniformly random delay in `[0, max]`, millisecond resolution.
    pub fn uniform(max: Duration) -> Self {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Self::none();
        }
        Self {
            describe: Arc::from(format!("uniform 0..={max_ms}ms")),
            sample: Arc::new(move || {
                let mut rng = rand::thread_rng();
                Duration::from_millis(rng.gen_range(0..=max_ms))
            }),
        }
    }

    /// Arbitrary provider.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        Self {
            describe: Arc::from("custom"),
            sample: Arc::new(f),
        }
    }

    /// True for the zero-jitter provider from [`Delay::none`].
    pub fn is_none(&self) -> bool {
        &*self.describe == "none"
    }

    /// Draw one delay.
    pub fn sample(&self) -> Duration {
        (self.sample)()
    }
}
