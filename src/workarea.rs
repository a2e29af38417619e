//! Static work-area registry.
//!
//! Work areas are fixed rectangular footprints on the site floor. The set is
//! known at start-up and never mutated; [`WorkAreaRegistry::reference`]
//! returns the process-wide table.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::WorkAreaId;
use crate::types::{Footprint, GroundPoint, GroundRect, Vec3};

/// Elevation of the work-area caption above the floor.
const LABEL_ELEVATION: f64 = 2.0;
/// Inset of the caption from the area's (-x, -z) corner.
const LABEL_INSET: f64 = 0.5;

/// Static configuration of one work area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct WorkArea {
    pub id: WorkAreaId,
    pub center: GroundPoint,
    pub size: Footprint,
}

impl WorkArea {
    pub const fn new(id: WorkAreaId, center: GroundPoint, size: Footprint) -> Self {
        Self { id, center, size }
    }

    pub fn bounds(&self) -> GroundRect {
        GroundRect::centered(self.center, self.size)
    }

    /// Outline corners on the floor, counter-clockwise from (-x, -z).
    pub fn frame_corners(&self) -> [Vec3; 4] {
        let GroundRect { min, max } = self.bounds();
        [
            min.at_elevation(0.0),
            GroundPoint::new(max.x, min.z).at_elevation(0.0),
            max.at_elevation(0.0),
            GroundPoint::new(min.x, max.z).at_elevation(0.0),
        ]
    }

    /// Anchor of the caption near the (-x, -z) corner.
    pub fn label_anchor(&self) -> Vec3 {
        self.bounds().min.at_elevation(LABEL_ELEVATION) + Vec3::new(LABEL_INSET, 0.0, LABEL_INSET)
    }

    pub fn title(&self) -> String {
        format!("Work area {}", self.id)
    }
}

/// Read-only lookup of work areas by id, iterated in ascending id order.
#[derive(Clone, Debug, Default)]
pub struct WorkAreaRegistry {
    areas: BTreeMap<WorkAreaId, WorkArea>,
}

static REFERENCE: OnceLock<WorkAreaRegistry> = OnceLock::new();

impl WorkAreaRegistry {
    /// Builds a registry. A later entry with a duplicate id replaces the earlier one.
    pub fn new(areas: impl IntoIterator<Item = WorkArea>) -> Self {
        Self {
            areas: areas.into_iter().map(|area| (area.id, area)).collect(),
        }
    }

    /// The site's six work areas.
    pub fn reference() -> &'static WorkAreaRegistry {
        REFERENCE.get_or_init(|| {
            Self::new([
                WorkArea::new(1, GroundPoint::new(-30.0, -40.0), Footprint::new(12.0 * 7.0, 4.0 * 5.0)),
                WorkArea::new(2, GroundPoint::new(-30.0, -17.0), Footprint::new(12.0 * 7.0, 4.0 * 5.0)),
                WorkArea::new(3, GroundPoint::new(-54.0, 17.0), Footprint::new(6.0 * 6.0, 4.0 * 5.0)),
                WorkArea::new(4, GroundPoint::new(-54.0, 40.0), Footprint::new(6.0 * 6.0, 4.0 * 5.0)),
                WorkArea::new(5, GroundPoint::new(15.0, 17.0), Footprint::new(6.0 * 7.0, 4.0 * 5.0)),
                WorkArea::new(6, GroundPoint::new(5.0, 40.0), Footprint::new(12.0 * 6.0, 4.0 * 5.0)),
            ])
        })
    }

    pub fn get(&self, id: WorkAreaId) -> Option<&WorkArea> {
        self.areas.get(&id)
    }

    pub fn contains(&self, id: WorkAreaId) -> bool {
        self.areas.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkArea> {
        self.areas.values()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Midpoint of the union of all footprints, where the site model is anchored.
    pub fn site_center(&self) -> Option<GroundPoint> {
        self.iter()
            .map(WorkArea::bounds)
            .reduce(|acc, rect| acc.union(&rect))
            .map(|rect| rect.center())
    }
}
