pub mod booking;
pub mod outcome;

pub use booking::*;
pub use outcome::*;
