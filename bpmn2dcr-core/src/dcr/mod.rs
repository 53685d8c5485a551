pub mod model;
pub mod translate;

pub use model::*;
