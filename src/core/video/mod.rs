pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod sampler;
pub mod source;

pub use error::{FrameExtractionError, VideoError};
pub use ffmpeg::FfmpegVideoSource;
pub use frame::{Frame, RawFrame};
pub use sampler::{FrameSampler, SamplerConfig};
pub use source::{DecodedVideo, VideoMetadata, VideoSource};
