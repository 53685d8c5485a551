pub mod model;
pub mod normalize;
pub mod pairing;
pub mod parser;

pub use model::*;
