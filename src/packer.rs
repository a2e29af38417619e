//! Linear packing of project groups inside their lanes.
//!
//! Each group is laid out left to right along X and centered on its lane's
//! anchor. Every block is preceded by a gap proportional to its breadth,
//! including the first one, so a group sits half a gap right of the exact
//! center. The quirk is kept for visual parity with the reference views.

use tracing::warn;

use crate::model::{BlockTag, ProjectGroup};
use crate::tracks::TrackAssignment;
use crate::workarea::WorkArea;

/// Unit conversion and spacing parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Site units per block unit
    pub scale: f64,
    /// Gap before each block as a fraction of its scaled breadth
    pub gap_ratio: f64,
}

impl PackingConfig {
    pub const DEFAULT_SCALE: f64 = 0.15;
    pub const DEFAULT_GAP_RATIO: f64 = 0.7;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            scale: Self::DEFAULT_SCALE,
            gap_ratio: Self::DEFAULT_GAP_RATIO,
        }
    }
}

/// Builder for `PackingConfig`.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the unit scale.
    pub fn scale(mut self, scale: f64) -> Self {
        self.config.scale = scale;
        self
    }

    /// Sets the gap ratio.
    pub fn gap_ratio(mut self, ratio: f64) -> Self {
        self.config.gap_ratio = ratio;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Where a lane sits on the floor: groups are centered on `x`, all boxes of
/// the lane share `z`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LaneAnchor {
    pub x: f64,
    pub z: f64,
}

/// Anchors for the fixed-lane view.
///
/// Lanes are spread symmetrically around the area center: half the scaled
/// width apart along X and one scaled depth apart along Z. With three lanes
/// that is "before / center / after".
pub fn fixed_lane_anchors(area: &WorkArea, lanes: usize, config: &PackingConfig) -> Vec<LaneAnchor> {
    let half_width = area.size.width * config.scale / 2.0;
    let track_spacing = area.size.depth * config.scale;
    let middle = (lanes.max(1) as f64 - 1.0) / 2.0;

    (0..lanes.max(1))
        .map(|lane| {
            let step = lane as f64 - middle;
            LaneAnchor {
                x: area.center.x + step * half_width,
                z: area.center.z + step * track_spacing,
            }
        })
        .collect()
}

/// Anchors for the one-lane-per-project view: equal columns across the
/// scaled width, all on the area's center line.
pub fn dynamic_lane_anchors(area: &WorkArea, lanes: usize, config: &PackingConfig) -> Vec<LaneAnchor> {
    let full_width = area.size.width * config.scale;
    let left = area.center.x - full_width / 2.0;

    (0..lanes)
        .map(|lane| LaneAnchor {
            x: left + full_width * (lane as f64 + 0.5) / lanes as f64,
            z: area.center.z,
        })
        .collect()
}

/// A block's footprint and resting height before any time-based adjustment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackedBlock {
    pub tag: BlockTag,
    /// Index of the owning group in the packed slice.
    pub group: usize,
    pub lane: usize,
    pub center_x: f64,
    pub center_z: f64,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

/// Packs every group along its lane.
///
/// Output follows group order, then member order (start ascending).
pub fn pack(
    groups: &[ProjectGroup<'_>],
    assignment: &TrackAssignment,
    anchors: &[LaneAnchor],
    config: &PackingConfig,
) -> Vec<PackedBlock> {
    let mut packed = Vec::with_capacity(groups.iter().map(|g| g.members.len()).sum());

    for (group_idx, group) in groups.iter().enumerate() {
        let Some(lane) = assignment.lane_of(group_idx) else {
            warn!(project = group.name, "group has no lane, skipping");
            continue;
        };
        let Some(anchor) = anchors.get(lane) else {
            warn!(project = group.name, lane, "lane has no anchor, skipping");
            continue;
        };

        let widths: Vec<f64> = group
            .members
            .iter()
            .map(|m| m.block.length() * config.scale)
            .collect();
        let gaps: Vec<f64> = group
            .members
            .iter()
            .map(|m| m.block.breadth() * config.scale * config.gap_ratio)
            .collect();
        let span: f64 = widths.iter().sum::<f64>() + gaps.iter().sum::<f64>();

        let mut acc_x = anchor.x - span / 2.0;
        for (i, member) in group.members.iter().enumerate() {
            acc_x += gaps[i];
            packed.push(PackedBlock {
                tag: member.tag,
                group: group_idx,
                lane,
                center_x: acc_x + widths[i] / 2.0,
                center_z: anchor.z,
                width: widths[i],
                depth: member.block.breadth() * config.scale,
                height: member.block.height() * config.scale,
            });
            acc_x += widths[i];
        }
    }

    packed
}
