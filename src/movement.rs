//! Step tracking of price moves between ok cycles
//!
//! The tracker keeps an anchor price and counts how many whole steps each new
//! price sits away from it. The anchor only moves when at least one full step
//! was crossed, so slow drifts accumulate until they add up to a step.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// How the step size is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Fixed USD amount per step
    FixedUsd,
    /// Fraction of the anchor price per step (0.001 = 0.1%)
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    pub mode: StepMode,
    pub step_value: f64,
}

impl StepConfig {
    pub fn fixed_usd(step_value: f64) -> Self {
        Self {
            mode: StepMode::FixedUsd,
            step_value,
        }
    }

    pub fn percentage(step_value: f64) -> Self {
        Self {
            mode: StepMode::Percentage,
            step_value,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.step_value.is_finite() || self.step_value <= 0.0 {
            return Err(ConfigError::invalid(
                "step value",
                "must be a positive number",
            ));
        }
        Ok(())
    }
}

/// Movement reported alongside an ok price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceMovement {
    /// Whole steps crossed this cycle (signed)
    pub steps: i64,
    /// Net steps since the first observed price
    pub index: i64,
    /// Price the next move is measured from
    pub anchor_price: f64,
    /// Consecutive steps up; reset by any move down
    pub up_streak: u64,
    /// Consecutive steps down; reset by any move up
    pub down_streak: u64,
}

/// Per-poller step state
#[derive(Debug)]
pub struct StepTracker {
    config: StepConfig,
    base_price: f64,
    anchor_price: f64,
    index: i64,
    up_streak: u64,
    down_streak: u64,
}

impl StepTracker {
    pub fn new(start_price: f64, config: StepConfig) -> Self {
        Self {
            config,
            base_price: start_price,
            anchor_price: start_price,
            index: 0,
            up_streak: 0,
            down_streak: 0,
        }
    }

    /// First price the tracker saw
    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    fn step_size(&self) -> f64 {
        match self.config.mode {
            StepMode::FixedUsd => self.config.step_value,
            StepMode::Percentage => self.anchor_price * self.config.step_value,
        }
    }

    /// Feeds a new price and returns the resulting movement
    pub fn update(&mut self, price: f64) -> PriceMovement {
        let step = self.step_size();
        let steps = if step.is_finite() && step > 0.0 && price.is_finite() {
            ((price - self.anchor_price) / step).trunc() as i64
        } else {
            0
        };

        if steps != 0 {
            self.index = self.index.saturating_add(steps);
            self.anchor_price = price;
        }
        if steps > 0 {
            self.up_streak = self.up_streak.saturating_add(steps.unsigned_abs());
            self.down_streak = 0;
        } else if steps < 0 {
            self.down_streak = self.down_streak.saturating_add(steps.unsigned_abs());
            self.up_streak = 0;
        }

        self.movement(steps)
    }

    /// Movement with no steps taken, used for the first observed price
    pub fn current(&self) -> PriceMovement {
        self.movement(0)
    }

    fn movement(&self, steps: i64) -> PriceMovement {
        PriceMovement {
            steps,
            index: self.index,
            anchor_price: self.anchor_price,
            up_streak: self.up_streak,
            down_streak: self.down_streak,
        }
    }
}
