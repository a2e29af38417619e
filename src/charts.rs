//! Chart aggregation: per-name worked hours turned into ranked slices.
//!
//! A pass runs in five steps:
//! 1. Sum the hours each name has been worked on up to `now` (blank names
//!    count as "Unknown", names with zero hours are dropped).
//! 2. Rank by hours, descending; ties keep first-encounter order.
//! 3. Pie: fold small slices and everything beyond `max_slices` into "Other".
//! 4. Bar: keep the top `top_n` names.
//! 5. Percentages are taken against the unfiltered total.
//!
//! Nothing is cached between passes.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::color::{Color, ColorCache, ColorSource};
use crate::model::{Block, ValidationError, WorkAreaId};
use crate::types::validation;
use crate::workarea::WorkAreaRegistry;

/// Label used for blocks without a usable name.
pub const UNKNOWN_LABEL: &str = "Unknown";
/// Label of the slice collecting folded contributions.
pub const OTHER_LABEL: &str = "Other";
/// Axis labels longer than this many characters are truncated.
pub const AXIS_LABEL_MAX_CHARS: usize = 12;

/// How inline slice labels are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    #[default]
    PercentOnly,
    Off,
}

/// Options controlling the pie and bar charts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
#[schema(
    example = json!({
        "small_slice_threshold": 0.05,
        "max_slices": 12,
        "top_n": 6,
        "label_mode": "percent_only",
        "use_bar_chart": false,
        "inner_diameter": 0.55
    })
)]
pub struct ChartOptions {
    /// Share of the total below which a pie slice is folded into "Other", in `[0, 1)`
    pub small_slice_threshold: f64,
    /// Most named pie slices shown, at least 1
    pub max_slices: usize,
    /// Pie slices with visible labels / bars shown
    pub top_n: usize,
    pub label_mode: LabelMode,
    pub use_bar_chart: bool,
    /// Donut hole as a fraction of the diameter, in `[0, 1)`
    pub inner_diameter: f64,
}

impl ChartOptions {
    pub const DEFAULT_SMALL_SLICE_THRESHOLD: f64 = 0.05;
    pub const DEFAULT_MAX_SLICES: usize = 12;
    pub const DEFAULT_TOP_N: usize = 6;
    pub const DEFAULT_INNER_DIAMETER: f64 = 0.55;

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_unit_fraction(self.small_slice_threshold, "small_slice_threshold")
            .map_err(ValidationError::InvalidOption)?;
        validation::validate_unit_fraction(self.inner_diameter, "inner_diameter")
            .map_err(ValidationError::InvalidOption)?;
        if self.max_slices < 1 {
            return Err(ValidationError::InvalidOption(
                "max_slices must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn chart_kind(&self) -> ChartKind {
        if self.use_bar_chart {
            ChartKind::Bar
        } else {
            ChartKind::Pie
        }
    }
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            small_slice_threshold: Self::DEFAULT_SMALL_SLICE_THRESHOLD,
            max_slices: Self::DEFAULT_MAX_SLICES,
            top_n: Self::DEFAULT_TOP_N,
            label_mode: LabelMode::PercentOnly,
            use_bar_chart: false,
            inner_diameter: Self::DEFAULT_INNER_DIAMETER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Pie,
    Bar,
}

/// One ranked contribution.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ChartSlice {
    pub label: String,
    /// Shortened label for category axes
    pub axis_label: String,
    /// Worked hours
    pub value: f64,
    pub percentage: f64,
    pub is_aggregated_other: bool,
    /// Whether the inline label is drawn; the slice is drawn either way
    pub label_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
    #[schema(value_type = String, example = "#FF0000")]
    pub color: Color,
}

/// The chart of one work area.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ChartSeries {
    pub work_area: WorkAreaId,
    pub title: String,
    pub kind: ChartKind,
    /// Unfiltered total of worked hours
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_diameter: Option<f64>,
    pub slices: Vec<ChartSlice>,
}

#[derive(Clone, Debug, PartialEq)]
struct NameTotal {
    name: String,
    value: f64,
}

/// Worked hours per name in `scope`, largest first. Zero totals are dropped.
fn ranked_totals(blocks: &[Block], scope: WorkAreaId, now: NaiveDateTime) -> Vec<NameTotal> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<NameTotal> = Vec::new();

    for block in blocks.iter().filter(|b| b.work_area == scope) {
        let name = if block.name.trim().is_empty() {
            UNKNOWN_LABEL
        } else {
            block.name.as_str()
        };
        let hours = block.worked_hours_until(now);
        match index_by_name.get(name) {
            Some(&idx) => totals[idx].value += hours,
            None => {
                index_by_name.insert(name, totals.len());
                totals.push(NameTotal {
                    name: name.to_string(),
                    value: hours,
                });
            }
        }
    }

    totals.retain(|t| t.value > 0.0);
    totals.sort_by(|a, b| b.value.total_cmp(&a.value));
    totals
}

struct SliceBuilder<'c, 's> {
    total: f64,
    label_mode: LabelMode,
    colors: &'c mut ColorCache<'s>,
}

impl SliceBuilder<'_, '_> {
    fn slice(&mut self, name: &str, value: f64, is_other: bool, label_visible: bool) -> ChartSlice {
        let percentage = value / self.total * 100.0;
        let label_visible = label_visible && self.label_mode == LabelMode::PercentOnly;
        ChartSlice {
            label: name.to_string(),
            axis_label: shorten_label(name),
            value,
            percentage,
            is_aggregated_other: is_other,
            label_visible,
            label_text: label_visible.then(|| format_percent(percentage)),
            color: self.colors.color_of(name),
        }
    }
}

/// Pie slices: small names fold into "Other", then the tail is trimmed to `max_slices`.
fn pie_slices(ranked: Vec<NameTotal>, options: &ChartOptions, builder: &mut SliceBuilder<'_, '_>) -> Vec<ChartSlice> {
    let total = builder.total;
    let mut others = 0.0;
    let mut keep: Vec<NameTotal> = Vec::with_capacity(ranked.len());
    for item in ranked {
        if item.value / total < options.small_slice_threshold {
            others += item.value;
        } else {
            keep.push(item);
        }
    }
    while keep.len() > options.max_slices {
        if let Some(smallest) = keep.pop() {
            others += smallest.value;
        }
    }

    let mut slices: Vec<ChartSlice> = keep
        .iter()
        .enumerate()
        .map(|(idx, item)| builder.slice(&item.name, item.value, false, idx < options.top_n))
        .collect();
    if others > 0.0 {
        let idx = slices.len();
        slices.push(builder.slice(OTHER_LABEL, others, true, idx < options.top_n));
    }
    slices
}

/// Bar slices: the `top_n` largest names, no folding.
fn bar_slices(ranked: Vec<NameTotal>, options: &ChartOptions, builder: &mut SliceBuilder<'_, '_>) -> Vec<ChartSlice> {
    ranked
        .into_iter()
        .take(options.top_n)
        .map(|item| builder.slice(&item.name, item.value, false, true))
        .collect()
}

/// Ranked slices of one work area at `now`.
///
/// Returns no slices when nothing has been worked on in `scope` yet.
pub fn aggregate(
    blocks: &[Block],
    scope: WorkAreaId,
    now: NaiveDateTime,
    options: &ChartOptions,
    colors: &mut ColorCache<'_>,
) -> Vec<ChartSlice> {
    aggregate_with_total(blocks, scope, now, options, colors).0
}

fn aggregate_with_total(
    blocks: &[Block],
    scope: WorkAreaId,
    now: NaiveDateTime,
    options: &ChartOptions,
    colors: &mut ColorCache<'_>,
) -> (Vec<ChartSlice>, f64) {
    let ranked = ranked_totals(blocks, scope, now);
    let total: f64 = ranked.iter().map(|t| t.value).sum();
    if total <= 0.0 {
        return (Vec::new(), 0.0);
    }

    let mut builder = SliceBuilder {
        total,
        label_mode: options.label_mode,
        colors,
    };
    let slices = match options.chart_kind() {
        ChartKind::Pie => pie_slices(ranked, options, &mut builder),
        ChartKind::Bar => bar_slices(ranked, options, &mut builder),
    };
    (slices, total)
}

/// One series per registered work area, in ascending id order.
///
/// Colors are looked up once per distinct label for the whole pass.
pub fn build_series(
    blocks: &[Block],
    registry: &WorkAreaRegistry,
    now: NaiveDateTime,
    options: &ChartOptions,
    color_source: &dyn ColorSource,
) -> Vec<ChartSeries> {
    let mut colors = ColorCache::new(color_source);
    let kind = options.chart_kind();

    registry
        .iter()
        .map(|area| {
            let (slices, total) = aggregate_with_total(blocks, area.id, now, options, &mut colors);
            ChartSeries {
                work_area: area.id,
                title: area.title(),
                kind,
                total,
                inner_diameter: (kind == ChartKind::Pie).then_some(options.inner_diameter),
                slices,
            }
        })
        .collect()
}

/// Shortens a name for a category axis.
///
/// Drops parenthesized parts, collapses whitespace and truncates to
/// [`AXIS_LABEL_MAX_CHARS`] characters plus an ellipsis.
pub fn shorten_label(name: &str) -> String {
    if name.trim().is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    let mut stripped = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        stripped.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    stripped.push_str(rest);

    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() > AXIS_LABEL_MAX_CHARS {
        let mut truncated: String = normalized.chars().take(AXIS_LABEL_MAX_CHARS).collect();
        truncated.push('…');
        truncated
    } else {
        normalized
    }
}

/// Formats a percentage with at most one decimal, e.g. `12.3%` or `50%`.
pub fn format_percent(percentage: f64) -> String {
    let fixed = format!("{:.1}", percentage);
    let trimmed = fixed.strip_suffix(".0").unwrap_or(&fixed);
    format!("{}%", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::NamePalette;
    use crate::types::EPSILON_GENERAL;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn worked(name: &str, area: WorkAreaId, start_h: i64, hours: i64) -> Block {
        let start = t0() + Duration::hours(start_h);
        Block::new(name, start, start + Duration::hours(hours), area, (1.0, 1.0, 1.0)).unwrap()
    }

    fn far_future() -> NaiveDateTime {
        t0() + Duration::days(365)
    }

    fn run(blocks: &[Block], options: &ChartOptions) -> Vec<ChartSlice> {
        let palette = NamePalette::default();
        let mut colors = ColorCache::new(&palette);
        aggregate(blocks, 1, far_future(), options, &mut colors)
    }

    fn summary(slices: &[ChartSlice]) -> Vec<(String, f64)> {
        slices.iter().map(|s| (s.label.clone(), s.value)).collect()
    }

    #[test]
    fn small_slices_fold_into_other() {
        let blocks = vec![
            worked("A", 1, 0, 50),
            worked("B", 1, 0, 30),
            worked("C", 1, 0, 15),
            worked("D", 1, 0, 5),
        ];
        let options = ChartOptions {
            small_slice_threshold: 0.1,
            max_slices: 10,
            ..ChartOptions::default()
        };

        let slices = run(&blocks, &options);
        assert_eq!(
            summary(&slices),
            vec![
                ("A".to_string(), 50.0),
                ("B".to_string(), 30.0),
                ("C".to_string(), 15.0),
                (OTHER_LABEL.to_string(), 5.0)
            ]
        );
        for (slice, expected) in slices.iter().zip([50.0, 30.0, 15.0, 5.0]) {
            assert!((slice.percentage - expected).abs() < EPSILON_GENERAL);
        }
        assert!(slices[3].is_aggregated_other);
        assert!(!slices[0].is_aggregated_other);
    }

    #[test]
    fn excess_slices_fold_from_the_tail() {
        let blocks = vec![
            worked("A", 1, 0, 40),
            worked("B", 1, 0, 30),
            worked("C", 1, 0, 20),
            worked("D", 1, 0, 10),
        ];
        let options = ChartOptions {
            small_slice_threshold: 0.0,
            max_slices: 2,
            ..ChartOptions::default()
        };

        let slices = run(&blocks, &options);
        assert_eq!(
            summary(&slices),
            vec![
                ("A".to_string(), 40.0),
                ("B".to_string(), 30.0),
                (OTHER_LABEL.to_string(), 30.0)
            ]
        );
    }

    #[test]
    fn ties_keep_encounter_order_and_names_are_summed() {
        let blocks = vec![
            worked("late", 1, 0, 10),
            worked("early", 1, 0, 4),
            worked("early", 1, 10, 6),
            worked("other-area", 2, 0, 100),
        ];
        let options = ChartOptions {
            small_slice_threshold: 0.0,
            ..ChartOptions::default()
        };

        let slices = run(&blocks, &options);
        assert_eq!(
            summary(&slices),
            vec![("late".to_string(), 10.0), ("early".to_string(), 10.0)]
        );
    }

    #[test]
    fn blank_names_become_unknown() {
        let blocks = vec![worked("  ", 1, 0, 3), worked("", 1, 0, 2)];
        let slices = run(&blocks, &ChartOptions::default());
        assert_eq!(summary(&slices), vec![(UNKNOWN_LABEL.to_string(), 5.0)]);
    }

    #[test]
    fn future_blocks_contribute_nothing() {
        let blocks = vec![worked("A", 1, 48, 10), worked("B", 1, 0, 10)];
        let palette = NamePalette::default();
        let mut colors = ColorCache::new(&palette);
        let slices = aggregate(&blocks, 1, t0() + Duration::hours(5), &ChartOptions::default(), &mut colors);

        assert_eq!(summary(&slices), vec![("B".to_string(), 5.0)]);
        assert_eq!(slices[0].percentage, 100.0);
    }

    #[test]
    fn zero_total_yields_no_slices() {
        let blocks = vec![worked("A", 1, 0, 0)];
        assert!(run(&blocks, &ChartOptions::default()).is_empty());
        assert!(run(&[], &ChartOptions::default()).is_empty());
    }

    #[test]
    fn labels_beyond_top_n_are_hidden_but_kept() {
        let blocks = vec![
            worked("A", 1, 0, 50),
            worked("B", 1, 0, 30),
            worked("C", 1, 0, 20),
        ];
        let options = ChartOptions {
            small_slice_threshold: 0.0,
            top_n: 2,
            ..ChartOptions::default()
        };

        let slices = run(&blocks, &options);
        assert_eq!(slices.len(), 3);
        let visible: Vec<bool> = slices.iter().map(|s| s.label_visible).collect();
        assert_eq!(visible, vec![true, true, false]);
        assert_eq!(slices[0].label_text.as_deref(), Some("50%"));
        assert_eq!(slices[2].label_text, None);
    }

    #[test]
    fn label_mode_off_hides_every_label() {
        let blocks = vec![worked("A", 1, 0, 50)];
        let options = ChartOptions {
            label_mode: LabelMode::Off,
            ..ChartOptions::default()
        };
        let slices = run(&blocks, &options);
        assert!(slices.iter().all(|s| !s.label_visible && s.label_text.is_none()));
    }

    #[test]
    fn bar_chart_takes_top_n_without_folding() {
        let blocks = vec![
            worked("A", 1, 0, 50),
            worked("B", 1, 0, 30),
            worked("C", 1, 0, 15),
            worked("D", 1, 0, 5),
        ];
        let options = ChartOptions {
            use_bar_chart: true,
            top_n: 3,
            small_slice_threshold: 0.5,
            ..ChartOptions::default()
        };

        let slices = run(&blocks, &options);
        assert_eq!(
            summary(&slices),
            vec![
                ("A".to_string(), 50.0),
                ("B".to_string(), 30.0),
                ("C".to_string(), 15.0)
            ]
        );
        assert!(slices.iter().all(|s| !s.is_aggregated_other));
        assert!((slices[2].percentage - 15.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn series_cover_every_registered_area() {
        let blocks = vec![worked("A", 1, 0, 10), worked("Z", 42, 0, 10)];
        let series = build_series(
            &blocks,
            WorkAreaRegistry::reference(),
            far_future(),
            &ChartOptions::default(),
            &NamePalette::default(),
        );

        assert_eq!(series.len(), 6);
        assert_eq!(series[0].title, "Work area 1");
        assert_eq!(series[0].slices.len(), 1);
        assert_eq!(series[0].inner_diameter, Some(ChartOptions::DEFAULT_INNER_DIAMETER));
        assert!(series[1..].iter().all(|s| s.slices.is_empty() && s.total == 0.0));
    }

    #[test]
    fn options_are_validated() {
        assert!(ChartOptions::default().validate().is_ok());
        let bad_threshold = ChartOptions {
            small_slice_threshold: 1.0,
            ..ChartOptions::default()
        };
        assert!(bad_threshold.validate().is_err());
        let bad_slices = ChartOptions {
            max_slices: 0,
            ..ChartOptions::default()
        };
        assert!(matches!(bad_slices.validate(), Err(ValidationError::InvalidOption(_))));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ChartOptions = serde_json::from_str(r#"{"use_bar_chart": true, "label_mode": "off"}"#).unwrap();
        assert!(options.use_bar_chart);
        assert_eq!(options.label_mode, LabelMode::Off);
        assert_eq!(options.max_slices, ChartOptions::DEFAULT_MAX_SLICES);
    }

    #[test]
    fn shorten_label_strips_collapses_and_truncates() {
        assert_eq!(shorten_label("Hull (A)  block"), "Hull block");
        assert_eq!(shorten_label("  spaced\t\tout  "), "spaced out");
        assert_eq!(shorten_label("Superstructure 12"), "Superstructu…");
        assert_eq!(shorten_label("open (paren"), "open (paren");
        assert_eq!(shorten_label("a(b(c)d)e"), "ad)e");
        assert_eq!(shorten_label("   "), UNKNOWN_LABEL);
        assert_eq!(shorten_label("(all gone)"), "");
    }

    #[test]
    fn percent_format_keeps_one_optional_decimal() {
        assert_eq!(format_percent(50.0), "50%");
        assert_eq!(format_percent(12.34), "12.3%");
        assert_eq!(format_percent(99.96), "100%");
    }

    proptest! {
        #[test]
        fn pie_percentages_sum_to_hundred(
            hours in prop::collection::vec(1i64..500, 1..30),
            threshold in 0.0f64..0.5,
            max_slices in 1usize..8,
        ) {
            let blocks: Vec<Block> = hours
                .iter()
                .enumerate()
                .map(|(i, h)| worked(&format!("P{i}"), 1, 0, *h))
                .collect();
            let options = ChartOptions {
                small_slice_threshold: threshold,
                max_slices,
                ..ChartOptions::default()
            };

            let slices = run(&blocks, &options);
            let sum: f64 = slices.iter().map(|s| s.percentage).sum();
            prop_assert!((sum - 100.0).abs() <= 100.0 * 1e-6);
            prop_assert!(slices.iter().filter(|s| !s.is_aggregated_other).count() <= max_slices);
            prop_assert_eq!(run(&blocks, &options), slices);
        }
    }
}
