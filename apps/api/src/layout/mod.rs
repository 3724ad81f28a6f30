// Layout engine: markup parsing, line wrapping, topic planning, rectangle
// packing and the page-fit loop. Everything here is synchronous and CPU-bound;
// handlers call it from tokio::task::spawn_blocking.

pub mod font_metrics;
pub mod markup;
pub mod packer;
pub mod page_fit;
pub mod planner;
pub mod wrap;

// Re-export the public API consumed by the document pipeline and handlers.
pub use font_metrics::{StandardMetrics, TextMeasurer};
pub use packer::{GuillotinePacker, RectanglePacker};
pub use page_fit::{generate_layout, LayoutConfig, LayoutResult};
