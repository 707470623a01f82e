pub mod api;
pub mod core;

pub use crate::api::{DeepfakeDetector, DetectApiError, ResultStore};
pub use crate::core::classifier::{FrameClassifier, LoadedClassifier, Prediction};
pub use crate::core::detection::{DetectionResult, DetectorConfig, Verdict};
pub use crate::core::store::{ResultSink, SinkConfig};
pub use crate::core::video::VideoSource;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("deepscan_lib"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // host applications install their own `log` backend
    }
}
