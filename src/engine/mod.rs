//! Layer lifecycle: lazy construction, base-layer exclusivity, overlay
//! toggling and viewport fitting.

pub mod cache;
pub mod fitter;
pub mod overlay;
pub mod raster;
pub mod session;
pub mod status;
