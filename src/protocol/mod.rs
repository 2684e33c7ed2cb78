// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Host command protocol: wire messages, byte-stream parsing, and command dispatch.

pub mod dispatch;
pub mod messages;
pub mod parser;

pub use dispatch::Dispatcher;
pub use messages::{CommandFrame, FrameSink, Response};
pub use parser::FrameParser;
