pub mod loader;
pub mod vertex;
pub mod cpu;

pub use vertex::HalaVertex;
pub use cpu::{HalaMesh, HalaMeshIndex, HalaModel};
