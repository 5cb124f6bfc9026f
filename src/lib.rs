pub mod config;
pub mod emg;
pub mod kernel;
pub mod service;
pub mod session;
pub mod vision;

pub use config::PipelineConfig;
pub use service::AcquisitionService;
