//! # RustSp0256Emulator
//!
//! SP0256-AL2 speech synthesizer emulator with a lock-free dual-core
//! architecture.
//!
//! ## Architecture
//!
//! The interface core samples the ALD strobe and address bus and latches
//! requests; the synthesis core renders sample buffers to the PWM output.
//! The two meet only at [`RequestSlot`] (one request in flight, matching
//! the original chip) and the atomic [`SignalState`]:
//! - No callbacks, no shared mutable state, no mutexes
//! - Busy gating on LRQ enforces strict one-at-a-time FIFO order
//! - Faults halt synthesis instead of emitting garbage audio

#![cfg_attr(not(test), no_std)]

pub mod allophone;
pub mod channel;
pub mod config;
pub mod fault;
pub mod hal;
pub mod log_globals;
pub mod logging;
pub mod playback;
pub mod protocol;
pub mod signal;
pub mod uart_logger;

pub use allophone::{AllophoneDescriptor, AllophoneTable};
pub use channel::{PlaybackRequest, RequestSlot};
pub use config::CONFIG;
pub use fault::{FaultCode, FaultState};
pub use log_globals::{IF_LOG_STREAM, SYNTH_LOG_STREAM};
pub use playback::{PlaybackEngine, SessionReport};
pub use protocol::{ProtocolEvent, ProtocolMonitor, Submit};
pub use signal::{SignalSnapshot, SignalState};
