//! Utilities. OBVIOUSLY.

pub(crate) mod json;
pub mod ser;
