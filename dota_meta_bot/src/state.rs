use std::sync::atomic::{AtomicBool, Ordering};

use crate::{config::BotConfig, pipeline::Pipeline, transcript::Transcript};

/// Everything handlers share. Built once in `entry` and handed to the
/// dispatcher as a dependency.
#[derive(Debug)]
pub struct BotState {
    pub config: BotConfig,
    pub pipeline: Pipeline,
    pub transcript: Transcript,
    /// Admins can switch replies off for everyone.
    enabled: AtomicBool,
}

impl BotState {
    pub fn new(config: BotConfig) -> Result<Self, reqwest::Error> {
        let pipeline = Pipeline::new(&config)?;
        let transcript = Transcript::load(&config.transcript_path, config.transcript_cap.get());
        Ok(Self {
            config,
            pipeline,
            transcript,
            enabled: AtomicBool::new(true),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Returns the previous value.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::Relaxed)
    }
}
