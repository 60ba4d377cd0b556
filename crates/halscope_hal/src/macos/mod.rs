//! macOS Backend - CoreAudio HAL
//!
//! `CoreAudioHal` forwards the `Hal` protocol to the `AudioObject*` C API.
//!
//! # Submodules
//!
//! - `backend`: the `Hal` implementation and listener trampoline
//! - `cf`: CoreFoundation conversions for qualifiers and object-typed values

mod backend;
mod cf;

pub use backend::CoreAudioHal;
