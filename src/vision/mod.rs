pub mod angles;
pub mod joints;
pub mod landmarks;
pub mod pipeline;
pub mod smoothing;
pub mod source;
