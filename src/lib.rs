//! Layout and aggregation engine for shipyard block schedules.
//!
//! Turns a list of scheduled blocks into 3D placements per work area (a
//! snapshot at one instant or a cumulative schedule over time) and into
//! per-area work distribution charts. The HTTP service in `api` and the
//! debounced chart `session` are thin layers over the pure passes in
//! `layout` and `charts`.

pub mod api;
pub mod charts;
pub mod color;
pub mod config;
pub mod height;
pub mod layout;
pub mod model;
pub mod packer;
pub mod session;
pub mod tracks;
pub mod types;
pub mod workarea;
