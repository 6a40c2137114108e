pub mod config;
pub mod engine;

pub use engine::{SaveTarget, SavedImage, SnapshotEngine, image_name_for};
