pub mod core;
pub mod merge;
pub mod select;
pub mod split;


pub use self::core::*;
