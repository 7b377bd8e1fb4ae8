pub mod chapter;
pub mod index;
pub mod paper;
pub mod stats;

pub use chapter::*;
pub use index::*;
pub use paper::*;
pub use stats::*;
