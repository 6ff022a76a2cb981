// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Core engine module - orchestrates capture and delivery

mod engine;
mod frame_loop;
pub mod shutdown;

pub use engine::{Engine, EngineReport};
pub use frame_loop::{FrameLoop, FrameLoopStats};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
