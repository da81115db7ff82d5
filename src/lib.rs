//! Extract a dominant color palette from an image and render it into
//! configuration file templates.
//!
//! The pipeline is linear: [`pipeline::extract`] pulls colors out of the
//! image, [`pipeline::assign`] names them, [`pipeline::render`] substitutes
//! them into templates and [`pipeline::output`] writes the results.

pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod preview;

pub use error::{Error, Result};
