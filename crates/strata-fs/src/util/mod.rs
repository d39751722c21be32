//! Stateless helpers for archive and save-file formats.

mod byteorder;
mod text;

pub use byteorder::*;
pub use text::*;
