//! Global log stream instances.
//!
//! One stream per core, single consumer (the UART drain):
//! the interface loop on core 0 and the render loop on core 1 each push
//! into their own ring, so neither contends with the other.

use crate::logging::LogStream;

/// Log stream for core 0 (protocol monitor / interface loop).
pub static IF_LOG_STREAM: LogStream = LogStream::new();

/// Log stream for core 1 (playback engine / render loop).
pub static SYNTH_LOG_STREAM: LogStream = LogStream::new();
