pub mod header;
pub mod reading;

pub use header::*;
pub use reading::*;
