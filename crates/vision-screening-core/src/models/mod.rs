//! Domain models for the vision-screening system.

mod exam;
mod flags;
mod school;
mod screening;
mod snapshot;
mod student;

pub use exam::*;
pub use flags::*;
pub use school::*;
pub use screening::*;
pub use snapshot::*;
pub use student::*;
