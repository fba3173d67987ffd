pub mod extent;
pub mod layer;
pub mod resource;
