pub mod model;
mod normalize;
pub mod point;
pub mod points;
pub mod reconcile;
pub mod sync;

pub use anyhow::Result;
pub use normalize::remove_emojis;
