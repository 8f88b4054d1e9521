pub mod card;
pub mod remote;
pub mod stats;

pub use card::*;
pub use remote::*;
pub use stats::*;
