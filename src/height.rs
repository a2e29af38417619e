//! Time-to-height mapping for the cumulative schedule view.
//!
//! All work areas share one vertical time axis anchored at the earliest
//! block start of the whole data set. A block's baseline encodes when it
//! started, its height how long it has been worked on.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{Block, span_days};

/// Parameters of the time axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HeightConfig {
    /// Height gained per elapsed day, before scaling
    pub rate_per_day: f64,
    /// Smallest height a box is drawn with
    pub min_height: f64,
}

impl HeightConfig {
    pub const DEFAULT_RATE_PER_DAY: f64 = 0.7;
    pub const DEFAULT_MIN_HEIGHT: f64 = 0.1;

    pub fn builder() -> HeightConfigBuilder {
        HeightConfigBuilder::default()
    }
}

impl Default for HeightConfig {
    fn default() -> Self {
        Self {
            rate_per_day: Self::DEFAULT_RATE_PER_DAY,
            min_height: Self::DEFAULT_MIN_HEIGHT,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HeightConfigBuilder {
    config: HeightConfig,
}

impl HeightConfigBuilder {
    pub fn rate_per_day(mut self, rate: f64) -> Self {
        self.config.rate_per_day = rate;
        self
    }

    pub fn min_height(mut self, height: f64) -> Self {
        self.config.min_height = height;
        self
    }

    pub fn build(self) -> HeightConfig {
        self.config
    }
}

/// Global time range of a data set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimeAxis {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeAxis {
    /// `min(start)` / `max(end)` over all blocks, `None` for an empty set.
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Option<Self> {
        blocks.into_iter().fold(None, |axis, block| {
            Some(match axis {
                None => TimeAxis {
                    start: block.start,
                    end: block.end,
                },
                Some(TimeAxis { start, end }) => TimeAxis {
                    start: start.min(block.start),
                    end: end.max(block.end),
                },
            })
        })
    }

    pub fn total_days(&self) -> f64 {
        span_days(self.start, self.end)
    }
}

/// Vertical placement of a box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VerticalExtent {
    pub baseline: f64,
    pub height: f64,
}

impl VerticalExtent {
    pub fn center(&self) -> f64 {
        self.baseline + self.height / 2.0
    }
}

/// One labelled mark on a date ruler.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RulerTick {
    pub date: NaiveDateTime,
    pub label: String,
    pub elevation: f64,
}

/// A vertical date scale standing at `x` on the floor.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct DateRuler {
    pub x: f64,
    pub z: f64,
    pub height: f64,
    pub ticks: Vec<RulerTick>,
}

/// Maps blocks onto the shared time axis.
#[derive(Copy, Clone, Debug)]
pub struct HeightMapper {
    axis: TimeAxis,
    config: HeightConfig,
    scale: f64,
}

impl HeightMapper {
    pub fn new(axis: TimeAxis, config: HeightConfig, scale: f64) -> Self {
        Self {
            axis,
            config,
            scale,
        }
    }

    /// Elevation reached after `days` days.
    pub fn elevation_for_days(&self, days: f64) -> f64 {
        days * self.config.rate_per_day * self.scale
    }

    /// `(baseline, height)` of `block` as seen at `now`.
    pub fn map(&self, block: &Block, now: NaiveDateTime) -> VerticalExtent {
        let effective_end = now.min(block.end);
        let elapsed_days = span_days(block.start, effective_end).max(0.0);
        let height = self
            .elevation_for_days(elapsed_days)
            .max(self.config.min_height);
        let baseline = self
            .elevation_for_days(span_days(self.axis.start, block.start))
            .max(0.0);
        VerticalExtent { baseline, height }
    }

    /// Ruler covering the whole axis, one tick every `max(1, days / 10)` days.
    pub fn ruler(&self, x: f64, z: f64) -> DateRuler {
        let total_days = self.axis.total_days();
        let interval_days = (total_days / 10.0).max(1.0);
        let ticks = (0..)
            .map(|step| step as f64 * interval_days)
            .take_while(|days| *days <= total_days)
            .map(|days| {
                let date = self.axis.start
                    + Duration::milliseconds((days * 86_400_000.0).round() as i64);
                RulerTick {
                    date,
                    label: date.format("%Y-%m-%d").to_string(),
                    elevation: self.elevation_for_days(days),
                }
            })
            .collect();

        DateRuler {
            x,
            z,
            height: self.elevation_for_days(total_days),
            ticks,
        }
    }
}
