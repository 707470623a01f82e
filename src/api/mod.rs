pub mod detector;
pub mod error;
pub mod results;

pub use detector::DeepfakeDetector;
pub use error::DetectApiError;
pub use results::ResultStore;
