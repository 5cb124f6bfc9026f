pub mod cancel;
pub mod retry;
pub mod source;
pub mod state;
pub mod telemetry;
pub mod time;
