//! Client for the Taskwarrior command-line program.
//!
//! Queries are built as [`filter::Expression`] values, every call runs the
//! `task` executable once with a fixed set of `rc.*` overrides, and exported
//! JSON is decoded into [`Task`] records.

pub mod client;
pub mod error;
pub mod filter;
pub mod logger;
pub mod overrides;
pub mod shell;
pub mod task;
pub mod uda;


pub use client::{Client, ClientOptions};
pub use error::{ClientError, Result};
pub use filter::{Expression, FieldMap, FilterValue};
pub use overrides::OverrideMap;
pub use task::{Annotation, Status, Task};
pub use uda::{UdaConfig, UdaType};
