//! Input and output buffers for incremental parsing.
//!
//! [`input::InputBuffer`] slides a window of raw bytes over the log
//! reader; [`output::OutputBuffer`] collects the tokens of the message
//! being parsed. Both grow by doubling and keep outstanding offsets
//! valid across growth.

pub mod input;
pub mod output;

pub use input::{InputBuffer, InputByte};
pub use output::OutputBuffer;
