pub mod advisor;
pub mod decoder;
pub mod metrics_manager;
pub mod relay;
pub mod upstream;
