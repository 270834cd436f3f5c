use std::sync::Arc;

use crate::error::HalaMeshletError;
use crate::scene::{HalaModel, HalaMeshIndex};

/// The geometry of one meshlet as produced by a division strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HalaMeshletGeometry {
  /// Indices into the vertices of the mesh, or of the combined meshes.
  pub vertices: Vec<u32>,
  /// Indices into `vertices`, three per triangle.
  pub indices: Vec<u8>,
  pub vertex_count: u32,
  pub index_count: u32,
}

/// The implementation of the meshlet geometry.
impl HalaMeshletGeometry {
  /// Create a geometry from its vertex and local index lists.
  /// param vertices: The vertex indices.
  /// param indices: The local indices.
  /// return: The geometry.
  pub fn new(vertices: Vec<u32>, indices: Vec<u8>) -> Self {
    let vertex_count = vertices.len() as u32;
    let index_count = indices.len() as u32;
    Self {
      vertices,
      indices,
      vertex_count,
      index_count,
    }
  }

  pub fn triangle_count(&self) -> u32 {
    self.index_count / 3
  }

  /// Resolve the local indices back to indices of the source vertex buffer.
  /// return: The triangle list of this meshlet.
  pub fn resolve_indices(&self) -> Vec<u32> {
    self.indices[..self.index_count as usize].iter()
      .map(|&i| self.vertices[i as usize])
      .collect()
  }

  /// Check the geometry against a vertex and index budget.
  /// param max_vertices: The maximum number of vertices.
  /// param max_indices: The maximum number of indices.
  /// return: The result.
  pub fn validate(&self, max_vertices: u32, max_indices: u32) -> Result<(), HalaMeshletError> {
    if self.vertex_count as usize != self.vertices.len() || self.index_count as usize != self.indices.len() {
      return Err(HalaMeshletError::configuration(&format!(
        "Meshlet counts ({} vertices, {} indices) do not match its lists ({} vertices, {} indices).",
        self.vertex_count, self.index_count, self.vertices.len(), self.indices.len())));
    }
    if self.vertex_count == 0 || self.vertex_count > max_vertices {
      return Err(HalaMeshletError::configuration(&format!(
        "Meshlet has {} vertices, expected 1..={}.", self.vertex_count, max_vertices)));
    }
    if self.index_count == 0 || self.index_count > max_indices || self.index_count % 3 != 0 {
      return Err(HalaMeshletError::configuration(&format!(
        "Meshlet has {} indices, expected a multiple of 3 in 3..={}.", self.index_count, max_indices)));
    }
    if let Some(&bad) = self.indices.iter().find(|&&i| i as u32 >= self.vertex_count) {
      return Err(HalaMeshletError::configuration(&format!(
        "Meshlet local index {} is out of range of {} vertices.", bad, self.vertex_count)));
    }
    Ok(())
  }
}

/// The meshlet on the CPU side.
#[derive(Debug, Clone)]
pub struct HalaMeshlet {
  /// The model this meshlet was generated from.
  pub model: Arc<HalaModel>,
  /// Only set if the meshes were not combined upon creation of the meshlet.
  pub mesh_index: Option<HalaMeshIndex>,
  pub geometry: HalaMeshletGeometry,
}

/// The implementation of the meshlet.
impl HalaMeshlet {
  pub fn vertices(&self) -> &[u32] {
    &self.geometry.vertices
  }

  pub fn indices(&self) -> &[u8] {
    &self.geometry.indices
  }

  pub fn vertex_count(&self) -> u32 {
    self.geometry.vertex_count
  }

  pub fn index_count(&self) -> u32 {
    self.geometry.index_count
  }
}
