//! Pipeline stages for document-to-PDF conversion.
//!
//! Each submodule implements one transformation step. Everything after
//! [`input`] is synchronous and runs inside the batch's `spawn_blocking`
//! closure; the stages share [`geometry`] for page maths.
//!
//! ## Data Flow
//!
//! ```text
//! input ─▶ validate ─▶ classify ─┬─ image ───▶ placement ────────────────────┐
//!                                ├─ text ────▶ text ────────────────────────┤
//!                                ├─ markdown ▶ markdown ─┐                   ├─▶ assemble
//!                                ├─ html ────────────────┼▶ layout ─▶ raster ┤   (render)
//!                                └─ docx ────▶ archive ──┘                   │
//! ```
//!
//! 1. [`input`]: in-memory or on-disk files; bytes are read lazily
//! 2. [`validate`]: batch and per-file limits, supported-type check
//! 3. [`classify`]: MIME type first, extension second
//! 4. [`placement`]: scale an image onto its own page
//! 5. [`text`]: monospace wrapping and line-based pagination
//! 6. [`markdown`] / [`archive`]: produce HTML from Markdown and DOCX
//! 7. [`layout`] / [`raster`]: lay out HTML, rasterise, slice into strips
//! 8. [`assemble`]: append page units to a [`assemble::DocumentSink`]
//! 9. [`render`] / [`memory`]: pdfium and in-memory backends

pub mod archive;
pub mod assemble;
pub mod classify;
pub mod encode;
pub mod fonts;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod markdown;
pub mod memory;
pub mod placement;
pub mod raster;
pub mod render;
pub mod text;
pub mod validate;
