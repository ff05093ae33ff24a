//! Common types shared by every engine of the controller.
//!
//! This module provides the data model that flows between the engines. It includes:
//! 1. **Requests:** Bank-addressed reads and writes with their payloads and tags.
//! 2. **Commands:** Intents, granted physical commands, DFI frames and completions.
//! 3. **Error Handling:** Configuration errors reported at construction time and
//!    requests the simulator refuses to queue.

/// DRAM command, DFI frame and completion types.
pub mod command;

/// Configuration and submission error types.
pub mod error;

/// Request, opcode and payload types.
pub mod request;

pub use command::{
    CommandIntent, CommandKind, Completion, ControlSignals, DfiFrame, DfiPhase, IntentSource,
    PhysicalCommand, PRECHARGE_ALL_BIT,
};
pub use error::{ConfigError, SubmitError};
pub use request::{Opcode, Payload, Request, RequestTag};
