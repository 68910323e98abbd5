// Kura offline cache library

pub mod cache;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod logging;
pub mod network;
pub mod records;

pub use error::KuraError;
