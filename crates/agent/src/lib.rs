//! The Periscope researcher agent: mode policy + bounded step loop.

pub mod mode;
pub mod researcher;

pub use mode::{ModePlan, QuickSearchTool, SearchMode};
pub use researcher::Researcher;
