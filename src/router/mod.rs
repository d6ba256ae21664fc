//! Segmented path routing and key routing for trigger events.

mod core;
mod path;

pub use core::{RouteEntry, RouteResolution, RouteTable, RouteTableBuilder, Segment};
pub use path::{normalize_path, ParamVec, PathPattern, MAX_INLINE_PARAMS};
