pub mod sequence;

pub use self::sequence::*;
