use std::path::Path;

use glam::Vec3;

use crate::error::{HalaMeshletError, HalaMeshletErrorKind};
use super::mesh::{HalaMesh, HalaMeshIndex};
use super::super::loader::HalaGltfLoader;

/// A model is a named collection of meshes.
/// Meshlets keep the model alive through an `Arc<HalaModel>`, the model is never mutated by them.
#[derive(Debug, Default)]
pub struct HalaModel {
  pub name: String,
  pub meshes: Vec<HalaMesh>,
}

/// The Drop implementation of the model.
impl Drop for HalaModel {
  fn drop(&mut self) {
    log::debug!("A HalaModel \"{}\" dropped.", self.name);
  }
}

/// The implementation of the model.
impl HalaModel {
  /// Create a new model from glTF file.
  /// param path: The path to the glTF file.
  /// return: The model.
  pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, HalaMeshletError> {
    // Check the file extension.
    let path = path.as_ref();
    let extension = path.extension()
      .ok_or(HalaMeshletError::new(HalaMeshletErrorKind::Loading, &format!("Get file \"{:?}\" extension failed.", path), None))?;
    let model = match extension.to_str() {
      // glTF file.
      Some("gltf") | Some("glb") => HalaGltfLoader::load(path),
      // Unsupported file.
      _ => Err(HalaMeshletError::new(HalaMeshletErrorKind::Loading, &format!("Unsupported file \"{:?}\".", path), None)),
    }?;

    log::debug!("A HalaModel \"{}\" created with {} meshes.", model.name, model.meshes.len());
    Ok(model)
  }

  /// Create a new model from glTF data in memory.
  /// param name: The name of the model.
  /// param data: The glTF or GLB bytes.
  /// return: The model.
  pub fn from_slice(name: &str, data: &[u8]) -> Result<Self, HalaMeshletError> {
    let model = HalaGltfLoader::load_slice(name, data)?;
    log::debug!("A HalaModel \"{}\" created with {} meshes.", model.name, model.meshes.len());
    Ok(model)
  }

  /// Create a new model from already loaded meshes.
  /// param name: The name of the model.
  /// param meshes: The meshes.
  /// return: The model.
  pub fn from_meshes(name: &str, meshes: Vec<HalaMesh>) -> Self {
    Self {
      name: name.to_owned(),
      meshes,
    }
  }

  pub fn num_meshes(&self) -> usize {
    self.meshes.len()
  }

  /// Get the mesh with the given index.
  /// param mesh_index: The mesh index.
  /// return: The mesh.
  pub fn mesh(&self, mesh_index: HalaMeshIndex) -> Result<&HalaMesh, HalaMeshletError> {
    self.meshes.get(mesh_index as usize)
      .ok_or(HalaMeshletError::configuration(&format!(
        "Mesh index {} is out of range, model \"{}\" has {} meshes.",
        mesh_index, self.name, self.meshes.len())))
  }

  /// Get the vertex positions of a single mesh.
  /// param mesh_index: The mesh index.
  /// return: The positions.
  pub fn positions_for_mesh(&self, mesh_index: HalaMeshIndex) -> Result<Vec<Vec3>, HalaMeshletError> {
    Ok(self.mesh(mesh_index)?.vertices.iter().map(|v| v.position).collect())
  }

  /// Get the triangle indices of a single mesh, local to that mesh's vertices.
  /// param mesh_index: The mesh index.
  /// return: The indices.
  pub fn indices_for_mesh(&self, mesh_index: HalaMeshIndex) -> Result<Vec<u32>, HalaMeshletError> {
    Ok(self.mesh(mesh_index)?.indices.clone())
  }

  /// Get the positions and indices of several meshes combined into one vertex and index space.
  /// The indices of every mesh are rebased by the number of vertices of the meshes before it.
  /// param mesh_indices: The meshes to combine, in order.
  /// return: The combined positions and indices.
  pub fn combined_positions_and_indices(&self, mesh_indices: &[HalaMeshIndex]) -> Result<(Vec<Vec3>, Vec<u32>), HalaMeshletError> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for &mesh_index in mesh_indices {
      let mesh = self.mesh(mesh_index)?;
      let offset = positions.len() as u32;
      positions.extend(mesh.vertices.iter().map(|v| v.position));
      indices.extend(mesh.indices.iter().map(|&i| i + offset));
    }
    Ok((positions, indices))
  }
}
