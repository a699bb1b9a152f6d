pub mod error;
pub mod interval;
pub mod models;
pub mod normalizer;
pub mod placement;
pub mod scheduler;
