//! Matrixon Common Library
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.11.0-alpha
//!
//! Error types, configuration loading and logging setup shared by the
//! Matrixon timeline crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{LogFormat, TimelineConfig};
pub use error::{MatrixonError, Result};
pub use logging::init_tracing;
