//! # inquest-tools
//!
//! Capability trait and tool implementations for the Inquest engine.
//!
//! Defines the `ToolCapability` trait that every diagnostic tool implements,
//! and provides:
//! - **Registry**: exact-name index of the capabilities a session may invoke
//! - **Command tools**: declarative command-template tools rendered with the
//!   model's parameters and executed through a `ProcessRunner`
//! - **Process DI**: the `ProcessRunner` trait plus the real `sh -c` runner

#![deny(unsafe_code)]

pub mod command;
pub mod errors;
pub mod process;
pub mod registry;
pub mod toolset;
pub mod traits;

pub use command::CommandTool;
pub use errors::ToolError;
pub use process::ShellProcessRunner;
pub use registry::ToolRegistry;
pub use toolset::{ToolDeclaration, Toolset, build_registry};
pub use traits::{ProcessOptions, ProcessOutput, ProcessRunner, ToolCapability, ToolContext, ToolOutput};
