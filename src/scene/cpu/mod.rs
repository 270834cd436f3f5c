pub mod mesh;
pub mod model;

pub use mesh::{HalaMesh, HalaMeshIndex};
pub use model::HalaModel;
