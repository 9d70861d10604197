pub mod analysis;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod population;
