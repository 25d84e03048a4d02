pub mod automation;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod runner;
