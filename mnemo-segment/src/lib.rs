pub mod segment;

// Re-export the main segmentation entry points for external use
pub use segment::{Fragment, Segmenter, fragment_bounds};
