use std::sync::Arc;

use glam::Vec3;

use crate::error::HalaMeshletError;
use crate::scene::{HalaModel, HalaMeshIndex};

/// A model together with the meshes of it that should be divided into meshlets.
#[derive(Debug, Clone)]
pub struct HalaModelSelection {
  pub model: Arc<HalaModel>,
  pub mesh_indices: Vec<HalaMeshIndex>,
}

/// The geometry of one selected mesh, indexed locally.
#[derive(Debug, Clone, Default)]
pub struct HalaMeshGeometry {
  pub mesh_index: HalaMeshIndex,
  pub positions: Vec<Vec3>,
  pub indices: Vec<u32>,
}

/// Select some meshes of a model.
/// param model: The shared model.
/// param mesh_indices: The meshes to select.
/// return: The selection.
pub fn make_model_selection(model: &Arc<HalaModel>, mesh_indices: &[HalaMeshIndex]) -> HalaModelSelection {
  HalaModelSelection {
    model: Arc::clone(model),
    mesh_indices: mesh_indices.to_vec(),
  }
}

/// Select all meshes of a model.
/// param model: The shared model.
/// return: The selection.
pub fn make_model_selection_all(model: &Arc<HalaModel>) -> HalaModelSelection {
  HalaModelSelection {
    model: Arc::clone(model),
    mesh_indices: (0..model.num_meshes() as HalaMeshIndex).collect(),
  }
}

/// Get the vertex positions and indices of all selected meshes combined into one index space.
/// param selection: The selection.
/// return: The combined positions and rebased indices.
pub fn get_vertices_and_indices(selection: &HalaModelSelection) -> Result<(Vec<Vec3>, Vec<u32>), HalaMeshletError> {
  selection.model.combined_positions_and_indices(&selection.mesh_indices)
}

/// Get the vertex positions and indices of every selected mesh on its own.
/// param selection: The selection.
/// return: One geometry per selected mesh, in selection order.
pub fn get_mesh_vertices_and_indices(selection: &HalaModelSelection) -> Result<Vec<HalaMeshGeometry>, HalaMeshletError> {
  selection.mesh_indices.iter()
    .map(|&mesh_index| {
      Ok(HalaMeshGeometry {
        mesh_index,
        positions: selection.model.positions_for_mesh(mesh_index)?,
        indices: selection.model.indices_for_mesh(mesh_index)?,
      })
    })
    .collect()
}
