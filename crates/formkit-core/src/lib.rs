#![forbid(unsafe_code)]

//! Core: field identifiers, clocks, editor configuration, and logging bootstrap.

pub mod clock;
pub mod config;
pub mod id;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigParse, DeletePolicy, EditorConfig, EditorConfigError, ImportPolicy};
pub use id::{FieldId, FieldIdAllocator, IdError};
