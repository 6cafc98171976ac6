pub mod health;
pub mod participants;
pub mod diagnostics;

pub use health::*;
pub use participants::*;
pub use diagnostics::*;
