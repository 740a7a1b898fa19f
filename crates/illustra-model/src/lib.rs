pub mod config;
pub mod error;
pub mod image;
pub mod query;

pub use config::*;
pub use error::*;
pub use image::*;
pub use query::*;
