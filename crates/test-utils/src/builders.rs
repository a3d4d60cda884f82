#![allow(dead_code)]

use std::collections::BTreeMap;

use cadence::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig, TriggerSpec};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, cmd: &str, trigger: TriggerSpec) -> Self {
        self.config.task.insert(
            name.to_string(),
            TaskConfig {
                cmd: cmd.to_string(),
                trigger,
            },
        );
        self
    }

    pub fn run_for(mut self, duration: &str) -> Self {
        self.config.config.run_for = Some(duration.to_string());
        self
    }

    pub fn default_jitter(mut self, duration: &str) -> Self {
        self.config.config.default_jitter = Some(duration.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> cadence::errors::Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn every(period: &str) -> TriggerSpec {
    TriggerSpec::Every {
        period: period.to_string(),
        jitter: None,
        stop_on_error: false,
    }
}

pub fn recurrent(interval: &str) -> TriggerSpec {
    TriggerSpec::Recurrent {
        interval: interval.to_string(),
        jitter: None,
        stop_on_error: false,
    }
}

pub fn after(task: &str) -> TriggerSpec {
    TriggerSpec::After {
        task: task.to_string(),
        jitter: None,
        stop_on_error: false,
    }
}

pub fn batch(inner: TriggerSpec, max_size: usize, window: &str) -> TriggerSpec {
    TriggerSpec::Batch {
        inner: Box::new(inner),
        max_size,
        window: window.to_string(),
        stop_on_error: None,
    }
}

pub fn skip_first(count: usize, inner: TriggerSpec) -> TriggerSpec {
    TriggerSpec::SkipFirst {
        count,
        inner: Box::new(inner),
    }
}

pub fn take_first(count: usize, inner: TriggerSpec) -> TriggerSpec {
    TriggerSpec::TakeFirst {
        count,
        inner: Box::new(inner),
    }
}
