mod pool;
pub mod registry;

pub use pool::{Extent, ExtentPool};
