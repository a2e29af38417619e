//! Lane (track) assignment for project groups.
//!
//! Groups must arrive sorted by group start (see [`crate::model::group_projects`]).
//! Two modes exist:
//! - `Fixed`: first-fit over a constant number of lanes; a group that fits
//!   nowhere goes to the center lane regardless of overlap.
//! - `Dynamic`: one lane per group in encounter order.

use std::collections::HashMap;

use tracing::debug;

use crate::model::ProjectGroup;

/// How many lanes a work area offers and how they are filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneMode {
    Fixed { lanes: usize },
    Dynamic,
}

impl LaneMode {
    pub const DEFAULT_FIXED_LANES: usize = 3;

    /// Fixed mode with at least one lane.
    pub fn fixed(lanes: usize) -> Self {
        LaneMode::Fixed {
            lanes: lanes.max(1),
        }
    }
}

/// Result of a lane assignment pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackAssignment {
    /// `group_lanes[g]` is the lane of the `g`-th input group.
    group_lanes: Vec<usize>,
    /// Group indices per lane, in assignment order.
    lanes: Vec<Vec<usize>>,
    /// Groups placed by the overflow rule.
    overflowed: Vec<usize>,
}

impl TrackAssignment {
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_of(&self, group_index: usize) -> Option<usize> {
        self.group_lanes.get(group_index).copied()
    }

    pub fn lane_members(&self, lane: usize) -> &[usize] {
        self.lanes.get(lane).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn overflowed(&self) -> &[usize] {
        &self.overflowed
    }

    pub fn is_overflowed(&self, group_index: usize) -> bool {
        self.overflowed.contains(&group_index)
    }

    /// `GroupName -> LaneIndex`.
    pub fn by_name<'a>(&self, groups: &[ProjectGroup<'a>]) -> HashMap<&'a str, usize> {
        groups
            .iter()
            .zip(&self.group_lanes)
            .map(|(group, &lane)| (group.name, lane))
            .collect()
    }
}

/// Assigns every group to a lane.
///
/// Total over well-formed input; never fails.
pub fn assign_tracks(groups: &[ProjectGroup<'_>], mode: LaneMode) -> TrackAssignment {
    match mode {
        LaneMode::Fixed { lanes } => assign_fixed(groups, lanes.max(1)),
        LaneMode::Dynamic => assign_dynamic(groups),
    }
}

fn assign_fixed(groups: &[ProjectGroup<'_>], lane_count: usize) -> TrackAssignment {
    let overflow_lane = lane_count / 2;
    let mut assignment = TrackAssignment {
        group_lanes: Vec::with_capacity(groups.len()),
        lanes: vec![Vec::new(); lane_count],
        overflowed: Vec::new(),
    };

    for (idx, group) in groups.iter().enumerate() {
        let free_lane = assignment.lanes.iter().position(|members| {
            members
                .iter()
                .all(|&other| groups[other].is_disjoint_from(group))
        });

        let lane = match free_lane {
            Some(lane) => lane,
            None => {
                debug!(
                    project = group.name,
                    lane = overflow_lane,
                    "no free lane, using overflow lane"
                );
                assignment.overflowed.push(idx);
                overflow_lane
            }
        };

        assignment.lanes[lane].push(idx);
        assignment.group_lanes.push(lane);
    }

    assignment
}

fn assign_dynamic(groups: &[ProjectGroup<'_>]) -> TrackAssignment {
    TrackAssignment {
        group_lanes: (0..groups.len()).collect(),
        lanes: (0..groups.len()).map(|idx| vec![idx]).collect(),
        overflowed: Vec::new(),
    }
}
