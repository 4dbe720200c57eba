//!
//! Domain macros organized by usage context.
//!
//! - [`entities`]: strong-typed id and shared-field macros

#[macro_use]
mod entities;
