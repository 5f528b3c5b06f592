pub mod analysis;
pub mod errors;
pub mod frame_extractor;
pub mod history;
pub mod media;
pub mod queue;
pub mod validation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
