//! Real-time audio backend for drumview.
//!
//! [`CpalEngine`] implements the playback core's `AudioEngine` on the
//! default output device through CPAL.

mod cpal_backend;
mod engine;
mod error;
mod render;

pub use cpal_backend::CpalOutput;
pub use engine::CpalEngine;
pub use error::AudioError;
