//! Classify module - event taxonomy and damage magnitudes

mod category;
mod magnitude;

pub use category::{Category, Classifier};
pub use magnitude::MagnitudeResolver;
