use glam::{
  Vec2,
  Vec3,
};

/// The vertex of a model mesh.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct HalaVertex {
  pub position: Vec3,
  pub normal: Vec3,
  pub tex_coord: Vec2,
}

/// The implementation of the vertex.
impl HalaVertex {
  /// Create a vertex with only a position.
  /// param position: The position.
  /// return: The vertex.
  pub fn from_position(position: Vec3) -> Self {
    Self {
      position,
      ..Default::default()
    }
  }
}
