pub mod grammar;
pub mod main;
pub mod stream;

pub use grammar::*;
pub use main::*;
pub use stream::*;
