//! Layout passes turning block lists into placements.
//!
//! Two views are supported:
//! - **Snapshot**: blocks live at one instant, fixed lanes, boxes resting on
//!   the floor.
//! - **Schedule**: every block, one lane per project, height encoding time.
//!
//! Both passes are pure: the same input always yields the same output and
//! nothing survives between passes.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::color::{ColorCache, ColorSource};
use crate::height::{DateRuler, HeightConfig, HeightMapper, TimeAxis};
use crate::model::{Block, BlockTag, GroupMember, Placement, ProjectGroup, WorkAreaId, group_projects};
use crate::packer::{PackedBlock, PackingConfig, dynamic_lane_anchors, fixed_lane_anchors, pack};
use crate::tracks::{LaneMode, TrackAssignment, assign_tracks};
use crate::types::Vec3;
use crate::workarea::{WorkArea, WorkAreaRegistry};

/// Parameters shared by both layout views.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    pub packing: PackingConfig,
    pub height: HeightConfig,
    /// Lane count of the snapshot view
    pub fixed_lanes: usize,
    /// Floor positions of the schedule view's date rulers
    pub ruler_xs: (f64, f64),
}

impl LayoutConfig {
    pub const DEFAULT_RULER_XS: (f64, f64) = (-90.0, 50.0);
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            packing: PackingConfig::default(),
            height: HeightConfig::default(),
            fixed_lanes: LaneMode::DEFAULT_FIXED_LANES,
            ruler_xs: Self::DEFAULT_RULER_XS,
        }
    }
}

/// Projects sharing one lane.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LaneSummary {
    pub work_area: WorkAreaId,
    pub lane: usize,
    pub projects: Vec<String>,
    /// Projects placed here only because no lane was free
    pub overflowed: Vec<String>,
}

/// Blocks left out because their work area is not registered.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct SkippedArea {
    pub work_area: WorkAreaId,
    pub blocks: usize,
}

/// Output of one layout pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct LayoutResult {
    pub placements: Vec<Placement>,
    pub lanes: Vec<LaneSummary>,
    pub skipped: Vec<SkippedArea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_axis: Option<TimeAxis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rulers: Vec<DateRuler>,
}

impl LayoutResult {
    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    pub fn placement_for(&self, tag: BlockTag) -> Option<&Placement> {
        self.placements.iter().find(|p| p.tag == tag)
    }
}

fn members_by_area<'a>(
    members: impl IntoIterator<Item = GroupMember<'a>>,
) -> BTreeMap<WorkAreaId, Vec<GroupMember<'a>>> {
    let mut by_area: BTreeMap<WorkAreaId, Vec<GroupMember<'a>>> = BTreeMap::new();
    for member in members {
        by_area.entry(member.block.work_area).or_default().push(member);
    }
    by_area
}

fn tagged(blocks: &[Block]) -> impl Iterator<Item = GroupMember<'_>> {
    blocks.iter().enumerate().map(|(idx, block)| GroupMember {
        tag: BlockTag(idx),
        block,
    })
}

fn lane_summaries(
    area: &WorkArea,
    groups: &[ProjectGroup<'_>],
    assignment: &TrackAssignment,
) -> Vec<LaneSummary> {
    (0..assignment.lane_count())
        .map(|lane| {
            let members = assignment.lane_members(lane);
            LaneSummary {
                work_area: area.id,
                lane,
                projects: members.iter().map(|&g| groups[g].name.to_string()).collect(),
                overflowed: members
                    .iter()
                    .filter(|&&g| assignment.is_overflowed(g))
                    .map(|&g| groups[g].name.to_string())
                    .collect(),
            }
        })
        .collect()
}

/// Runs `place` for every registered area, recording unregistered ones.
fn for_each_area<'a>(
    members: impl IntoIterator<Item = GroupMember<'a>>,
    registry: &WorkAreaRegistry,
    result: &mut LayoutResult,
    mut place: impl FnMut(&WorkArea, Vec<ProjectGroup<'a>>, &mut LayoutResult),
) {
    for (area_id, members) in members_by_area(members) {
        let Some(area) = registry.get(area_id) else {
            warn!(
                work_area = area_id,
                blocks = members.len(),
                "work area not registered, skipping its blocks"
            );
            result.skipped.push(SkippedArea {
                work_area: area_id,
                blocks: members.len(),
            });
            continue;
        };
        place(area, group_projects(members), result);
    }
}

fn to_placement(
    packed: &PackedBlock,
    block: &Block,
    area: &WorkArea,
    y: f64,
    height: f64,
    vertical_baseline: Option<f64>,
    colors: &mut ColorCache<'_>,
) -> Placement {
    Placement {
        tag: packed.tag,
        name: block.name.clone(),
        work_area: area.id,
        lane: packed.lane,
        center: Vec3::new(packed.center_x, y, packed.center_z),
        width: packed.width,
        depth: packed.depth,
        height,
        vertical_baseline,
        color: colors.color_of(&block.name),
    }
}

/// Lays out the blocks live at `at` (start and end inclusive).
///
/// Projects are assigned to `config.fixed_lanes` lanes per work area; boxes
/// rest on the floor.
pub fn snapshot(
    blocks: &[Block],
    at: NaiveDateTime,
    registry: &WorkAreaRegistry,
    config: &LayoutConfig,
    color_source: &dyn ColorSource,
) -> LayoutResult {
    let mut result = LayoutResult::default();
    let mut colors = ColorCache::new(color_source);
    let live = tagged(blocks).filter(|m| m.block.is_live_at(at));

    for_each_area(live, registry, &mut result, |area, groups, result| {
        let assignment = assign_tracks(&groups, LaneMode::fixed(config.fixed_lanes));
        let anchors = fixed_lane_anchors(area, assignment.lane_count(), &config.packing);

        for packed in pack(&groups, &assignment, &anchors, &config.packing) {
            let block = &blocks[packed.tag.0];
            result.placements.push(to_placement(
                &packed,
                block,
                area,
                packed.height / 2.0,
                packed.height,
                None,
                &mut colors,
            ));
        }
        result.lanes.extend(lane_summaries(area, &groups, &assignment));
    });

    debug!(
        placements = result.placements.len(),
        skipped = result.skipped.len(),
        "snapshot layout finished"
    );
    result
}

/// Lays out every block on the shared time axis as seen at `now`.
///
/// Each project gets its own column; a box's baseline encodes its start and
/// its height the time worked so far. An empty block set yields an empty
/// layout.
pub fn schedule(
    blocks: &[Block],
    now: NaiveDateTime,
    registry: &WorkAreaRegistry,
    config: &LayoutConfig,
    color_source: &dyn ColorSource,
) -> LayoutResult {
    let Some(axis) = TimeAxis::from_blocks(blocks) else {
        return LayoutResult::default();
    };
    let mapper = HeightMapper::new(axis, config.height, config.packing.scale);

    let mut result = LayoutResult {
        time_axis: Some(axis),
        ..LayoutResult::default()
    };
    let mut colors = ColorCache::new(color_source);
    let mut ordered: Vec<GroupMember<'_>> = tagged(blocks).collect();
    ordered.sort_by_key(|m| m.block.start);

    for_each_area(ordered, registry, &mut result, |area, groups, result| {
        let assignment = assign_tracks(&groups, LaneMode::Dynamic);
        let anchors = dynamic_lane_anchors(area, assignment.lane_count(), &config.packing);

        for packed in pack(&groups, &assignment, &anchors, &config.packing) {
            let block = &blocks[packed.tag.0];
            let extent = mapper.map(block, now);
            result.placements.push(to_placement(
                &packed,
                block,
                area,
                extent.center(),
                extent.height,
                Some(extent.baseline),
                &mut colors,
            ));
        }
        result.lanes.extend(lane_summaries(area, &groups, &assignment));
    });

    let (left_x, right_x) = config.ruler_xs;
    result.rulers = vec![mapper.ruler(left_x, 0.0), mapper.ruler(right_x, 0.0)];

    debug!(
        placements = result.placements.len(),
        skipped = result.skipped.len(),
        "schedule layout finished"
    );
    result
}
