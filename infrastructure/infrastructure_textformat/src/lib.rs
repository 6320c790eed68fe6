//! Infrastructure Layer: term formatting.
//!
//! Two independent directions: [`display`] renders a `Term` as text,
//! [`eformat`] builds a `Term` from a placeholder template and a list of
//! substitution values.

mod display;
mod eformat;

pub use display::format_term;
pub use eformat::{eformat, parse_mfa, Arg, FormatError};
