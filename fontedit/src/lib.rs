//! An owned, editable in-memory font.
//!
//! Load an sfnt, query and edit its names, vertical metrics and glyphs, then
//! write it back out as an sfnt, WOFF or SVG font.

mod error;
mod font;
mod glyphs;
mod layout;
mod metrics;
mod names;
mod outline;
mod svg;
mod woff;

pub use error::Error;
pub use font::{EditableFont, OutputFormat, Outlines};
pub use metrics::{MetricDeltas, VerticalMetrics};
pub use write_fonts::types::GlyphId16;
