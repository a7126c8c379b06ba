//! Built-in feature processors
//!
//! Each module owns one processor family and the field names it declares.
//! All are pure functions of the conversation, their parameters, the
//! record-so-far, and the caller-supplied reference time.

pub mod handoff;
pub mod metadata;
pub mod state;
pub mod template;
pub mod temporal;
pub mod transfer;
pub mod validation;
