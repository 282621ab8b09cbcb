//! Subtitle-timed text-to-speech rendering.
//!
//! Turns timed subtitle segments into audio that lands exactly on the
//! authored word timing: words are chunked, synthesized through a pluggable
//! backend, time-stretched into their slots and streamed out lazily.
//! Several segment streams can be mixed into one timeline.

pub mod audio;
pub mod config;
pub mod merge;
pub mod render;
pub mod subtitle;
pub mod synth;
