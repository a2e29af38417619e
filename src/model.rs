//! Data models for the block layout engine.
//!
//! This module defines the fundamental data structures:
//! - `Block`: a named, time-bounded physical item assigned to one work area
//! - `ProjectGroup`: all blocks sharing a name within one work area
//! - `Placement`: a block with its computed position and extents
//!
//! Raw records enter through [`ingest`], which is the only place invalid
//! records are filtered out.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::color::Color;
use crate::types::{Vec3, validation};

/// Identifier of a work area in the registry.
pub type WorkAreaId = i32;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Signed length of `from..to` in days.
pub fn span_days(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Signed length of `from..to` in hours.
pub fn span_hours(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Validation error for block records and options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidInterval(_) => "invalid_interval",
            ValidationError::InvalidDimension(_) => "invalid_dimension",
            ValidationError::InvalidOption(_) => "invalid_option",
        }
    }
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    validation::validate_dimension(value, name).map_err(ValidationError::InvalidDimension)
}

/// Represents a scheduled block.
///
/// Identity is structural; several blocks may share a name.
///
/// # Fields
/// * `name` - Project name the block belongs to
/// * `start`, `end` - Time window, `end >= start`
/// * `work_area` - Target work area id
/// * `dims` - Physical size (length, breadth, height)
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Block {
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub work_area: WorkAreaId,
    #[schema(value_type = [f64; 3], example = json!([10.0, 2.0, 3.0]))]
    pub dims: (f64, f64, f64),
}

impl Block {
    /// Creates a new block with validation.
    ///
    /// # Returns
    /// `Ok(Block)` for valid values, otherwise `Err(ValidationError)`
    ///
    /// # Examples
    /// ```
    /// use blockviz_layout::model::Block;
    /// use chrono::NaiveDate;
    ///
    /// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap().and_hms_opt(0, 0, 0).unwrap();
    ///
    /// assert!(Block::new("P1", start, end, 1, (10.0, 2.0, 3.0)).is_ok());
    /// assert!(Block::new("P1", end, start, 1, (10.0, 2.0, 3.0)).is_err());
    /// ```
    pub fn new(
        name: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        work_area: WorkAreaId,
        dims: (f64, f64, f64),
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if end < start {
            return Err(ValidationError::InvalidInterval(format!(
                "end {} is before start {} for block '{}'",
                end, start, name
            )));
        }
        validate_dimension(dims.0, "Length")?;
        validate_dimension(dims.1, "Breadth")?;
        validate_dimension(dims.2, "Height")?;
        Ok(Self {
            name,
            start,
            end,
            work_area,
            dims,
        })
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.dims.0
    }

    #[inline]
    pub fn breadth(&self) -> f64 {
        self.dims.1
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.dims.2
    }

    /// Whether the block is active at `at` (both bounds inclusive).
    pub fn is_live_at(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    /// Hours worked up to `now`, never negative.
    pub fn worked_hours_until(&self, now: NaiveDateTime) -> f64 {
        let clamped_end = self.end.min(now);
        if clamped_end <= self.start {
            return 0.0;
        }
        span_hours(self.start, clamped_end)
    }
}

/// Unvalidated block record as supplied by the schedule provider.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "name": "P1 (hull)",
        "start": "2025-01-01T00:00:00",
        "end": "2025-01-10T00:00:00",
        "work_area": 1,
        "length": 10.0,
        "breadth": 2.0,
        "height": 3.0
    })
)]
pub struct BlockRecord {
    #[serde(default)]
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub work_area: WorkAreaId,
    pub length: f64,
    pub breadth: f64,
    pub height: f64,
}

impl BlockRecord {
    pub fn into_block(self) -> Result<Block, ValidationError> {
        Block::new(
            self.name,
            self.start,
            self.end,
            self.work_area,
            (self.length, self.breadth, self.height),
        )
    }
}

/// A record that was dropped during ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RejectedRecord {
    /// Position of the record in the supplied sequence.
    pub index: usize,
    pub name: String,
    pub reason_code: String,
    pub reason: String,
}

/// Outcome of ingesting a batch of records.
#[derive(Clone, Debug, Default)]
pub struct Ingested {
    pub blocks: Vec<Block>,
    /// `source_indices[i]` is the record index `blocks[i]` came from.
    pub source_indices: Vec<usize>,
    pub rejected: Vec<RejectedRecord>,
}

impl Ingested {
    /// Maps a block tag back to the index of the originating record.
    pub fn source_index(&self, tag: BlockTag) -> Option<usize> {
        self.source_indices.get(tag.0).copied()
    }
}

/// Validates records one by one; invalid records are dropped and reported,
/// never clamped.
pub fn ingest(records: impl IntoIterator<Item = BlockRecord>) -> Ingested {
    let mut ingested = Ingested::default();
    for (index, record) in records.into_iter().enumerate() {
        let name = record.name.clone();
        match record.into_block() {
            Ok(block) => {
                ingested.blocks.push(block);
                ingested.source_indices.push(index);
            }
            Err(err) => {
                warn!(index, name = %name, "dropping block record: {err}");
                ingested.rejected.push(RejectedRecord {
                    index,
                    name,
                    reason_code: err.code().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
    ingested
}

/// Opaque per-block data tag: the block's index in the slice handed to a
/// layout pass. Renderers attach it for hit-testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[schema(value_type = usize)]
pub struct BlockTag(pub usize);

/// A block together with its tag.
#[derive(Clone, Copy, Debug)]
pub struct GroupMember<'a> {
    pub tag: BlockTag,
    pub block: &'a Block,
}

/// All blocks sharing a name within one work area.
///
/// Members are ordered by start (stable). A group is never empty.
#[derive(Clone, Debug)]
pub struct ProjectGroup<'a> {
    pub name: &'a str,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub members: Vec<GroupMember<'a>>,
}

impl<'a> ProjectGroup<'a> {
    fn seed(member: GroupMember<'a>) -> Self {
        Self {
            name: &member.block.name,
            start: member.block.start,
            end: member.block.end,
            members: vec![member],
        }
    }

    fn push(&mut self, member: GroupMember<'a>) {
        self.start = self.start.min(member.block.start);
        self.end = self.end.max(member.block.end);
        self.members.push(member);
    }

    /// True if both groups can share a lane.
    pub fn is_disjoint_from(&self, other: &ProjectGroup<'_>) -> bool {
        other.end <= self.start || self.end <= other.start
    }
}

/// Groups blocks by name.
///
/// Groups come back sorted by group start ascending; ties keep the order in
/// which each name was first encountered.
pub fn group_projects<'a>(
    members: impl IntoIterator<Item = GroupMember<'a>>,
) -> Vec<ProjectGroup<'a>> {
    let mut index_by_name: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<ProjectGroup<'a>> = Vec::new();

    for member in members {
        match index_by_name.get(member.block.name.as_str()) {
            Some(&idx) => groups[idx].push(member),
            None => {
                index_by_name.insert(&member.block.name, groups.len());
                groups.push(ProjectGroup::seed(member));
            }
        }
    }

    for group in &mut groups {
        group.members.sort_by_key(|m| m.block.start);
    }
    groups.sort_by_key(|g| g.start);
    groups
}

/// A block with its computed position in the scene.
///
/// # Fields
/// * `tag` - Data tag of the placed block
/// * `lane` - Lane the block's project was assigned to
/// * `center` - Center of the box
/// * `width`, `depth`, `height` - Scaled extents along X, Z and Y
/// * `vertical_baseline` - Bottom of the box (schedule view only)
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Placement {
    pub tag: BlockTag,
    pub name: String,
    pub work_area: WorkAreaId,
    pub lane: usize,
    pub center: Vec3,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_baseline: Option<f64>,
    #[schema(value_type = String, example = "#FF0000")]
    pub color: Color,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn record(name: &str, start: u32, end: u32) -> BlockRecord {
        BlockRecord {
            name: name.to_string(),
            start: day(start),
            end: day(end),
            work_area: 1,
            length: 10.0,
            breadth: 2.0,
            height: 3.0,
        }
    }

    #[test]
    fn rejects_end_before_start() {
        let err = Block::new("X", day(5), day(1), 1, (1.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidInterval(_)));
        assert_eq!(err.code(), "invalid_interval");
    }

    #[test]
    fn accepts_zero_length_interval() {
        assert!(Block::new("X", day(5), day(5), 1, (1.0, 1.0, 1.0)).is_ok());
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        let err = Block::new("X", day(1), day(2), 1, (0.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDimension(_)));
        assert!(Block::new("X", day(1), day(2), 1, (1.0, f64::NAN, 1.0)).is_err());
    }

    #[test]
    fn ingest_drops_invalid_records_and_keeps_going() {
        let mut bad = record("bad", 9, 2);
        bad.work_area = 3;
        let records = vec![record("a", 1, 3), bad, record("c", 2, 4)];

        let ingested = ingest(records);
        assert_eq!(ingested.blocks.len(), 2);
        assert_eq!(ingested.rejected.len(), 1);
        assert_eq!(ingested.rejected[0].index, 1);
        assert_eq!(ingested.rejected[0].name, "bad");
        assert_eq!(ingested.source_index(BlockTag(1)), Some(2));
        assert_eq!(ingested.source_index(BlockTag(2)), None);
    }

    #[test]
    fn worked_hours_clamps_to_now_and_never_goes_negative() {
        let block = Block::new("X", day(2), day(4), 1, (1.0, 1.0, 1.0)).unwrap();
        assert_eq!(block.worked_hours_until(day(1)), 0.0);
        assert_eq!(block.worked_hours_until(day(3)), 24.0);
        assert_eq!(block.worked_hours_until(day(10)), 48.0);
    }

    #[test]
    fn groups_are_sorted_by_start_with_stable_ties() {
        let blocks = vec![
            Block::new("late", day(5), day(6), 1, (1.0, 1.0, 1.0)).unwrap(),
            Block::new("tie-a", day(1), day(2), 1, (1.0, 1.0, 1.0)).unwrap(),
            Block::new("tie-b", day(1), day(3), 1, (1.0, 1.0, 1.0)).unwrap(),
            Block::new("late", day(2), day(9), 1, (1.0, 1.0, 1.0)).unwrap(),
        ];
        let members = blocks.iter().enumerate().map(|(i, block)| GroupMember {
            tag: BlockTag(i),
            block,
        });

        let groups = group_projects(members);
        let names: Vec<_> = groups.iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["tie-a", "tie-b", "late"]);

        let late = &groups[2];
        assert_eq!(late.start, day(2));
        assert_eq!(late.end, day(9));
        let order: Vec<_> = late.members.iter().map(|m| m.tag).collect();
        assert_eq!(order, vec![BlockTag(3), BlockTag(0)]);
    }

    #[test]
    fn touching_groups_are_disjoint() {
        let a = Block::new("a", day(1), day(5), 1, (1.0, 1.0, 1.0)).unwrap();
        let b = Block::new("b", day(5), day(8), 1, (1.0, 1.0, 1.0)).unwrap();
        let c = Block::new("c", day(4), day(6), 1, (1.0, 1.0, 1.0)).unwrap();
        let groups = group_projects(
            [&a, &b, &c]
                .into_iter()
                .enumerate()
                .map(|(i, block)| GroupMember {
                    tag: BlockTag(i),
                    block,
                }),
        );

        assert!(groups[0].is_disjoint_from(&groups[2]));
        assert!(!groups[0].is_disjoint_from(&groups[1]));
        assert!(!groups[1].is_disjoint_from(&groups[2]));
    }
}
