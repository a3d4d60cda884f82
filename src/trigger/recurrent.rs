// src/trigger/recurrent.rs

use std::fmt;
use std::time::Duration;

use crate::engine::Lifetime;
use crate::errors::TriggerError;
use crate::trigger::every::{Interval, PeriodicSequence};
use crate::trigger::{Delay, EventSequence, describe_policy};

/// Like [`Every`](crate::trigger::Every), except the task body may choose the
/// next interval by responding with a `Value::Duration`.
///
/// Any other response (no value, a value of another type, a zero duration, a
/// recovered failure) falls back to `default_interval`; a missing or invalid
/// override is logged as a warning and never raises. Events a wrapper
/// discards are left unanswered and use the default silently.
#[derive(Debug, Clone)]
pub struct Recurrent {
    default_interval: Duration,
    delay: Delay,
    stop_on_error: bool,
}

impl Recurrent {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            default_interval,
            delay: Delay::none(),
            stop_on_error: false,
        }
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    pub(crate) fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        if self.default_interval.is_zero() {
            return Err(TriggerError::InvalidConfig(
                "recurrent: default interval must be greater than zero".to_string(),
            ));
        }
        Ok(Box::new(PeriodicSequence::new(
            self.to_string(),
            Interval::Adaptive(self.default_interval),
            self.delay.clone(),
            self.stop_on_error,
            lifetime.shutdown_signal(),
        )))
    }
}

impl fmt::Display for Recurrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recurrent (default {:?})", self.default_interval)?;
        describe_policy(f, &self.delay, self.stop_on_error)
    }
}
