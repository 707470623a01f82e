pub mod classifier;
pub mod detection;
pub mod store;
pub mod video;
