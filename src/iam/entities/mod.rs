mod principal;
mod privilege;

pub use principal::*;
pub use privilege::*;
