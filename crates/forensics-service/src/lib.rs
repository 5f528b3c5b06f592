pub mod aggregate;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod media;
pub mod queue;
pub mod sampler;
pub mod session;
pub mod state;

pub use config::ForensicsServiceConfig;
pub use queue::AnalysisQueue;
pub use state::ForensicsServiceState;
