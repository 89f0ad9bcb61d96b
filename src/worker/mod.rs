//! Worker process layer: invocation building and pipe ownership.
//!
//! ## Contents
//! - [`Invocation`], [`InvocationFactory`], [`EncoderFactory`] — declarative
//!   description of how to launch a worker, separated from spawning so it is
//!   unit-testable and substitutable.
//! - [`StreamKey`] — destination credential, masked in all log output.
//! - [`PipeHandle`], [`WorkerExit`], [`WriteError`] — OS-resource ownership
//!   for exactly one worker process.
//!
//! Session lifecycle lives above this module (`core`); nothing here knows
//! about registries or state machines.

mod invocation;
mod pipe;

pub use invocation::{
    DEFAULT_FFMPEG_BIN, DEFAULT_RTMP_BASE, EncoderFactory, Invocation, InvocationFactory,
    StreamKey,
};
pub use pipe::{PipeHandle, WorkerExit, WriteError};
