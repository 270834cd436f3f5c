use crate::scene::HalaVertex;

/// The index of a mesh inside of a model.
pub type HalaMeshIndex = u32;

/// A mesh is a list of vertices and a triangle list indexing them.
#[derive(Debug, Clone, Default)]
pub struct HalaMesh {
  pub name: String,
  pub vertices: Vec<HalaVertex>,
  pub indices: Vec<u32>,
  pub material_index: u32,
}

/// The implementation of the mesh.
impl HalaMesh {
  /// Create a mesh from positions and indices.
  /// param name: The name of the mesh.
  /// param positions: The vertex positions.
  /// param indices: The triangle indices.
  /// return: The mesh.
  pub fn from_positions(name: &str, positions: &[glam::Vec3], indices: Vec<u32>) -> Self {
    Self {
      name: name.to_owned(),
      vertices: positions.iter().map(|&p| HalaVertex::from_position(p)).collect(),
      indices,
      material_index: u32::MAX,
    }
  }

  pub fn vertex_count(&self) -> usize {
    self.vertices.len()
  }

  /// Get the number of whole triangles.
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }
}
