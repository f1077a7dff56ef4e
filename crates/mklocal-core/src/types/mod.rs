mod san;
mod subject;

pub use san::*;
pub use subject::*;
