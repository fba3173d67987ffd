pub mod config;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod models;
pub mod reader;
pub mod server;
pub mod traits;
pub mod utils;
pub mod viewport;

#[cfg(test)]
mod test_support;

pub use config::{Config, Source};
pub use engine::session::Session;
pub use error::LayerError;
pub use server::ViewerServer;
