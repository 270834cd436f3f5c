use std::sync::Arc;

use glam::Vec3;
use rayon::prelude::*;

use crate::error::HalaMeshletError;
use crate::scene::{HalaModel, HalaMeshIndex};
use super::accessor::{
  HalaModelSelection,
  get_vertices_and_indices,
  get_mesh_vertices_and_indices,
};
use super::cpu::{HalaMeshlet, HalaMeshletGeometry};

/// The largest vertex budget, local indices are stored in a byte.
pub const HALA_MESHLET_MAX_VERTICES_LIMIT: u32 = 256;

const MESHOPT_MAX_VERTICES: u32 = 255;
const MESHOPT_MAX_TRIANGLES: u32 = 512;

/// A division strategy which only looks at the indices.
/// Arguments: indices, model, mesh index (None if combined), max vertices, max indices.
pub type HalaDivideByIndicesFn = dyn Fn(&[u32], &HalaModel, Option<HalaMeshIndex>, u32, u32) -> Vec<HalaMeshletGeometry> + Send + Sync;

/// A division strategy which looks at the vertex positions and the indices.
/// Arguments: positions, indices, model, mesh index (None if combined), max vertices, max indices.
pub type HalaDivideByVerticesAndIndicesFn = dyn Fn(&[Vec3], &[u32], &HalaModel, Option<HalaMeshIndex>, u32, u32) -> Vec<HalaMeshletGeometry> + Send + Sync;

/// How the index buffer gets divided into meshlets.
/// The strategy only produces geometry, the model and mesh index are assigned afterwards.
pub enum HalaMeshletDivision {
  ByIndices(Box<HalaDivideByIndicesFn>),
  ByVerticesAndIndices(Box<HalaDivideByVerticesAndIndicesFn>),
}

impl std::fmt::Debug for HalaMeshletDivision {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::ByIndices(_) => write!(f, "HalaMeshletDivision::ByIndices"),
      Self::ByVerticesAndIndices(_) => write!(f, "HalaMeshletDivision::ByVerticesAndIndices"),
    }
  }
}

/// The default division is the basic sequential divider.
impl Default for HalaMeshletDivision {
  fn default() -> Self {
    Self::basic()
  }
}

/// The implementation of the meshlet division.
impl HalaMeshletDivision {
  /// Use a strategy which only needs the indices.
  /// param divider: The strategy.
  /// return: The division.
  pub fn divide_by_indices<F>(divider: F) -> Self
  where
    F: Fn(&[u32], &HalaModel, Option<HalaMeshIndex>, u32, u32) -> Vec<HalaMeshletGeometry> + Send + Sync + 'static,
  {
    Self::ByIndices(Box::new(divider))
  }

  /// Use a strategy which needs the vertex positions and the indices.
  /// param divider: The strategy.
  /// return: The division.
  pub fn divide_by_vertices_and_indices<F>(divider: F) -> Self
  where
    F: Fn(&[Vec3], &[u32], &HalaModel, Option<HalaMeshIndex>, u32, u32) -> Vec<HalaMeshletGeometry> + Send + Sync + 'static,
  {
    Self::ByVerticesAndIndices(Box::new(divider))
  }

  /// The basic sequential divider.
  pub fn basic() -> Self {
    Self::divide_by_indices(basic_meshlets_divider)
  }

  /// The meshoptimizer clusterizer.
  /// param cone_weight: The weight of the normal cone when growing a meshlet, 0 to ignore.
  /// return: The division.
  pub fn meshopt(cone_weight: f32) -> Self {
    Self::divide_by_vertices_and_indices(move |vertices, indices, model, mesh_index, max_vertices, max_indices| {
      meshopt_meshlets_divider(vertices, indices, model, mesh_index, max_vertices, max_indices, cone_weight)
    })
  }

  fn divide(
    &self,
    vertices: &[Vec3],
    indices: &[u32],
    model: &HalaModel,
    mesh_index: Option<HalaMeshIndex>,
    max_vertices: u32,
    max_indices: u32,
  ) -> Vec<HalaMeshletGeometry> {
    match self {
      Self::ByIndices(divider) => divider(indices, model, mesh_index, max_vertices, max_indices),
      Self::ByVerticesAndIndices(divider) => divider(vertices, indices, model, mesh_index, max_vertices, max_indices),
    }
  }
}

/// Check a meshlet budget.
/// param max_vertices: The maximum number of vertices of a meshlet.
/// param max_indices: The maximum number of indices of a meshlet.
/// return: The result.
pub fn validate_budget(max_vertices: u32, max_indices: u32) -> Result<(), HalaMeshletError> {
  if !(3..=HALA_MESHLET_MAX_VERTICES_LIMIT).contains(&max_vertices) {
    return Err(HalaMeshletError::configuration(&format!(
      "The maximum number of meshlet vertices {} is not in 3..={}.", max_vertices, HALA_MESHLET_MAX_VERTICES_LIMIT)));
  }
  if max_indices < 3 {
    return Err(HalaMeshletError::configuration(&format!(
      "The maximum number of meshlet indices {} can not hold a triangle.", max_indices)));
  }
  Ok(())
}

/// Divide the index buffer into meshlets by walking it triangle by triangle.
/// A meshlet is closed as soon as the next triangle would exceed either budget.
/// Vertices are only shared within the currently open meshlet.
/// param indices: The index buffer.
/// param model: The model the buffers belong to.
/// param mesh_index: The optional mesh index.
/// param max_vertices: The maximum number of vertices of a meshlet.
/// param max_indices: The maximum number of indices of a meshlet.
/// return: The meshlet geometries.
pub fn basic_meshlets_divider(
  indices: &[u32],
  model: &HalaModel,
  mesh_index: Option<HalaMeshIndex>,
  max_vertices: u32,
  max_indices: u32,
) -> Vec<HalaMeshletGeometry> {
  let triangles = indices.chunks_exact(3);
  if !triangles.remainder().is_empty() {
    log::warn!(
      "The index buffer of model \"{}\" (mesh {:?}) has {} trailing indices which do not form a triangle.",
      model.name, mesh_index, triangles.remainder().len());
  }

  let max_vertices = max_vertices as usize;
  let max_indices = max_indices as usize;
  let mut meshlets = Vec::new();
  let mut current = HalaMeshletGeometry::default();
  for triangle in triangles {
    let mut new_vertices = 0;
    for (i, vertex) in triangle.iter().enumerate() {
      if !current.vertices.contains(vertex) && !triangle[..i].contains(vertex) {
        new_vertices += 1;
      }
    }

    if !current.indices.is_empty()
      && (current.vertices.len() + new_vertices > max_vertices || current.indices.len() + 3 > max_indices)
    {
      meshlets.push(HalaMeshletGeometry::new(
        std::mem::take(&mut current.vertices),
        std::mem::take(&mut current.indices)));
    }

    for &vertex in triangle {
      let local = match current.vertices.iter().position(|&v| v == vertex) {
        Some(local) => local,
        None => {
          current.vertices.push(vertex);
          current.vertices.len() - 1
        }
      };
      current.indices.push(local as u8);
    }
  }
  if !current.indices.is_empty() {
    meshlets.push(HalaMeshletGeometry::new(current.vertices, current.indices));
  }

  meshlets
}

/// Divide the geometry into meshlets with the meshoptimizer clusterizer.
/// The budget is clamped to what meshoptimizer supports. Falls back to the basic divider when
/// the clamped budget holds no triangles or an index is out of the vertices.
/// param vertices: The vertex positions.
/// param indices: The index buffer.
/// param model: The model the buffers belong to.
/// param mesh_index: The optional mesh index.
/// param max_vertices: The maximum number of vertices of a meshlet.
/// param max_indices: The maximum number of indices of a meshlet.
/// param cone_weight: The weight of the normal cone.
/// return: The meshlet geometries.
pub fn meshopt_meshlets_divider(
  vertices: &[Vec3],
  indices: &[u32],
  model: &HalaModel,
  mesh_index: Option<HalaMeshIndex>,
  max_vertices: u32,
  max_indices: u32,
  cone_weight: f32,
) -> Vec<HalaMeshletGeometry> {
  let indices = &indices[..indices.len() - indices.len() % 3];
  if indices.is_empty() {
    return Vec::new();
  }

  // meshoptimizer asserts on more than 255 vertices, more than 512 triangles
  // or a triangle count not divisible by 4.
  let meshopt_max_vertices = max_vertices.min(MESHOPT_MAX_VERTICES) as usize;
  let meshopt_max_triangles = ((max_indices / 3).min(MESHOPT_MAX_TRIANGLES) & !3) as usize;
  if meshopt_max_triangles == 0 || vertices.is_empty() {
    log::debug!("The budget {}/{} is too small for meshoptimizer, use the basic divider.", max_vertices, max_indices);
    return basic_meshlets_divider(indices, model, mesh_index, max_vertices, max_indices);
  }
  if let Some(index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
    log::warn!(
      "The index {} of model \"{}\" is out of its {} vertices, use the basic divider.",
      index, model.name, vertices.len());
    return basic_meshlets_divider(indices, model, mesh_index, max_vertices, max_indices);
  }

  let adapter = match meshopt::VertexDataAdapter::new(
    meshopt::typed_to_bytes(vertices),
    std::mem::size_of::<Vec3>(),
    0,
  ) {
    Ok(adapter) => adapter,
    Err(err) => {
      log::warn!("Create the meshoptimizer vertex adapter of model \"{}\" failed: {:?}.", model.name, err);
      return basic_meshlets_divider(indices, model, mesh_index, max_vertices, max_indices);
    }
  };

  let meshlets = meshopt::build_meshlets(indices, &adapter, meshopt_max_vertices, meshopt_max_triangles, cone_weight);
  meshlets.iter()
    .map(|meshlet| HalaMeshletGeometry::new(meshlet.vertices.to_vec(), meshlet.triangles.to_vec()))
    .collect()
}

/// Divide the given geometry into meshlets.
/// param vertices: The vertex positions, only read by strategies which need them.
/// param indices: The index buffer.
/// param model: The model these buffers belong to.
/// param mesh_index: The mesh index, None if the meshes were combined.
/// param max_vertices: The maximum number of vertices of a meshlet.
/// param max_indices: The maximum number of indices of a meshlet.
/// param division: The division strategy.
/// return: The meshlets, each sharing ownership of the model.
pub fn divide_indexed_geometry_into_meshlets(
  vertices: &[Vec3],
  indices: &[u32],
  model: &Arc<HalaModel>,
  mesh_index: Option<HalaMeshIndex>,
  max_vertices: u32,
  max_indices: u32,
  division: &HalaMeshletDivision,
) -> Result<Vec<HalaMeshlet>, HalaMeshletError> {
  validate_budget(max_vertices, max_indices)?;

  let geometries = division.divide(vertices, indices, model, mesh_index, max_vertices, max_indices);
  for (index, geometry) in geometries.iter().enumerate() {
    geometry.validate(max_vertices, max_indices)
      .map_err(|err| HalaMeshletError::configuration(&format!(
        "The meshlet {} generated by {:?} for model \"{}\" is invalid: {}", index, division, model.name, err)))?;
  }

  Ok(geometries.into_iter()
    .map(|geometry| HalaMeshlet {
      model: Arc::clone(model),
      mesh_index,
      geometry,
    })
    .collect())
}

/// Divide the selected meshes of all models into meshlets.
/// param selections: The models and their meshes.
/// param division: The division strategy.
/// param combine_submeshes: If the meshes of a model should be combined into one vertex and index buffer.
/// param max_vertices: The maximum number of vertices of a meshlet.
/// param max_indices: The maximum number of indices of a meshlet.
/// return: The meshlets in selection order.
pub fn divide_into_meshlets(
  selections: &[HalaModelSelection],
  division: &HalaMeshletDivision,
  combine_submeshes: bool,
  max_vertices: u32,
  max_indices: u32,
) -> Result<Vec<HalaMeshlet>, HalaMeshletError> {
  validate_budget(max_vertices, max_indices)?;

  let mut meshlets = Vec::new();
  for selection in selections {
    if combine_submeshes {
      let (vertices, indices) = get_vertices_and_indices(selection)?;
      meshlets.extend(divide_indexed_geometry_into_meshlets(
        &vertices, &indices, &selection.model, None, max_vertices, max_indices, division)?);
    } else {
      let geometries = get_mesh_vertices_and_indices(selection)?;
      let batches = geometries.par_iter()
        .map(|geometry| divide_indexed_geometry_into_meshlets(
          &geometry.positions,
          &geometry.indices,
          &selection.model,
          Some(geometry.mesh_index),
          max_vertices,
          max_indices,
          division))
        .collect::<Result<Vec<_>, _>>()?;
      for batch in batches {
        meshlets.extend(batch);
      }
    }
    log::debug!(
      "Divided {} meshes of model \"{}\" into meshlets, {} meshlets in total.",
      selection.mesh_indices.len(), selection.model.name, meshlets.len());
  }

  Ok(meshlets)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::HalaMeshletErrorKind;
  use crate::meshlet::accessor::{make_model_selection, make_model_selection_all};
  use crate::scene::HalaMesh;

  fn grid(name: &str, width: u32, height: u32) -> HalaMesh {
    let mut positions = Vec::new();
    for y in 0..=height {
      for x in 0..=width {
        positions.push(Vec3::new(x as f32, y as f32, 0.0));
      }
    }
    let mut indices = Vec::new();
    for y in 0..height {
      for x in 0..width {
        let i = y * (width + 1) + x;
        indices.extend([i, i + 1, i + width + 1, i + 1, i + width + 2, i + width + 1]);
      }
    }
    HalaMesh::from_positions(name, &positions, indices)
  }

  fn empty_model() -> HalaModel {
    HalaModel::from_meshes("empty", Vec::new())
  }

  fn resolve_all(meshlets: &[HalaMeshletGeometry]) -> Vec<u32> {
    meshlets.iter().flat_map(|m| m.resolve_indices()).collect()
  }

  #[test]
  fn basic_divider_splits_before_exceeding_vertices() {
    let indices = [0, 1, 2, 2, 3, 4, 4, 5, 6, 6, 7, 0];
    let meshlets = basic_meshlets_divider(&indices, &empty_model(), None, 6, 9);
    assert!(meshlets.len() >= 2);
    for meshlet in &meshlets {
      meshlet.validate(6, 9).unwrap();
    }
    assert_eq!(resolve_all(&meshlets), indices.to_vec());
    // 0,1,2 + 3,4 + 5,6 is 7 vertices, so the third triangle opens a new meshlet.
    assert_eq!(meshlets[0].vertices, vec![0, 1, 2, 3, 4]);
    assert_eq!(meshlets[0].indices, vec![0, 1, 2, 2, 3, 4]);
    assert_eq!(meshlets[1].vertices, vec![4, 5, 6, 7, 0]);
  }

  #[test]
  fn basic_divider_closes_on_index_budget() {
    let indices = [0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 5];
    let meshlets = basic_meshlets_divider(&indices, &empty_model(), None, 64, 6);
    assert_eq!(meshlets.len(), 2);
    assert_eq!(meshlets[0].index_count, 6);
    assert_eq!(meshlets[1].vertices, vec![0, 3, 4, 5]);
    assert_eq!(resolve_all(&meshlets), indices.to_vec());
  }

  #[test]
  fn basic_divider_reproduces_stream_on_grid() {
    let mesh = grid("grid", 13, 9);
    let meshlets = basic_meshlets_divider(&mesh.indices, &empty_model(), None, 32, 60);
    for meshlet in &meshlets {
      meshlet.validate(32, 60).unwrap();
      let mut unique = meshlet.vertices.clone();
      unique.sort_unstable();
      unique.dedup();
      assert_eq!(unique.len(), meshlet.vertices.len());
    }
    assert_eq!(resolve_all(&meshlets), mesh.indices);
  }

  #[test]
  fn basic_divider_dedups_degenerate_triangles() {
    let meshlets = basic_meshlets_divider(&[7, 7, 8, 8, 9, 7], &empty_model(), None, 3, 6);
    assert_eq!(meshlets.len(), 1);
    assert_eq!(meshlets[0].vertices, vec![7, 8, 9]);
    assert_eq!(meshlets[0].indices, vec![0, 0, 1, 1, 2, 0]);
  }

  #[test]
  fn basic_divider_drops_trailing_partial_triangle() {
    let meshlets = basic_meshlets_divider(&[0, 1, 2, 3], &empty_model(), None, 64, 378);
    assert_eq!(resolve_all(&meshlets), vec![0, 1, 2]);
  }

  #[test]
  fn empty_input_gives_no_meshlets() {
    let model = Arc::new(empty_model());
    let meshlets = divide_indexed_geometry_into_meshlets(
      &[], &[], &model, None, 64, 378, &HalaMeshletDivision::default()).unwrap();
    assert!(meshlets.is_empty());
    let meshlets = divide_into_meshlets(
      &[make_model_selection_all(&model)], &HalaMeshletDivision::default(), true, 64, 378).unwrap();
    assert!(meshlets.is_empty());
  }

  #[test]
  fn invalid_budget_fails_before_dividing() {
    let model = Arc::new(empty_model());
    let division = HalaMeshletDivision::divide_by_indices(|_, _, _, _, _| panic!("must not run"));
    for (max_vertices, max_indices) in [(2, 378), (257, 378), (64, 2)] {
      let err = divide_indexed_geometry_into_meshlets(
        &[], &[0, 1, 2], &model, None, max_vertices, max_indices, &division).unwrap_err();
      assert_eq!(err.kind(), HalaMeshletErrorKind::Configuration);
    }
  }

  #[test]
  fn custom_strategy_output_is_validated() {
    let model = Arc::new(empty_model());
    let division = HalaMeshletDivision::divide_by_indices(|_, _, _, _, _| {
      vec![HalaMeshletGeometry::new((0..10).collect(), vec![0, 1, 2])]
    });
    let err = divide_indexed_geometry_into_meshlets(&[], &[0, 1, 2], &model, None, 8, 378, &division).unwrap_err();
    assert_eq!(err.kind(), HalaMeshletErrorKind::Configuration);
  }

  #[test]
  fn vertices_strategy_receives_positions() {
    let model = Arc::new(HalaModel::from_meshes("grid", vec![grid("grid", 2, 2)]));
    let division = HalaMeshletDivision::divide_by_vertices_and_indices(|vertices, indices, _, mesh_index, _, _| {
      assert_eq!(vertices.len(), 9);
      assert_eq!(mesh_index, Some(0));
      vec![HalaMeshletGeometry::new(indices[..3].to_vec(), vec![0, 1, 2])]
    });
    let meshlets = divide_into_meshlets(&[make_model_selection_all(&model)], &division, false, 64, 378).unwrap();
    assert_eq!(meshlets.len(), 1);
    assert_eq!(meshlets[0].mesh_index, Some(0));
  }

  #[test]
  fn meshlets_share_the_model() {
    let model = Arc::new(HalaModel::from_meshes("grid", vec![grid("a", 6, 6), grid("b", 3, 3)]));
    let meshlets = divide_into_meshlets(
      &[make_model_selection_all(&model)], &HalaMeshletDivision::default(), true, 16, 24).unwrap();
    assert!(meshlets.len() > 1);
    assert_eq!(Arc::strong_count(&model), 1 + meshlets.len());
    assert!(meshlets.iter().all(|m| m.mesh_index.is_none() && Arc::ptr_eq(&m.model, &model)));
  }

  #[test]
  fn per_mesh_division_keeps_mesh_order() {
    let model = Arc::new(HalaModel::from_meshes("grid", vec![grid("a", 6, 6), grid("b", 3, 3), grid("c", 5, 1)]));
    let meshlets = divide_into_meshlets(
      &[make_model_selection(&model, &[2, 0, 1])], &HalaMeshletDivision::default(), false, 16, 24).unwrap();
    let mut order = meshlets.iter().filter_map(|m| m.mesh_index).collect::<Vec<_>>();
    order.dedup();
    assert_eq!(order, vec![2, 0, 1]);
    for mesh_index in [0, 1, 2] {
      let resolved = meshlets.iter()
        .filter(|m| m.mesh_index == Some(mesh_index))
        .flat_map(|m| m.geometry.resolve_indices())
        .collect::<Vec<_>>();
      assert_eq!(resolved, model.meshes[mesh_index as usize].indices);
    }
  }

  fn sorted_triangles(indices: &[u32]) -> Vec<Vec<u32>> {
    let mut triangles = indices.chunks(3)
      .map(|t| { let mut t = t.to_vec(); t.sort_unstable(); t })
      .collect::<Vec<_>>();
    triangles.sort();
    triangles
  }

  fn meshopt_on_grid(width: u32, height: u32, max_vertices: u32, max_indices: u32) -> (HalaMesh, Vec<HalaMeshlet>) {
    let model = Arc::new(HalaModel::from_meshes("grid", vec![grid("grid", width, height)]));
    let meshlets = divide_into_meshlets(
      &[make_model_selection_all(&model)], &HalaMeshletDivision::meshopt(0.0), true, max_vertices, max_indices).unwrap();
    (model.meshes[0].clone(), meshlets)
  }

  fn assert_covers(mesh: &HalaMesh, meshlets: &[HalaMeshlet], max_vertices: u32, max_indices: u32) {
    for meshlet in meshlets {
      meshlet.geometry.validate(max_vertices, max_indices).unwrap();
    }
    let resolved = meshlets.iter()
      .flat_map(|m| m.geometry.resolve_indices())
      .collect::<Vec<_>>();
    assert_eq!(sorted_triangles(&resolved), sorted_triangles(&mesh.indices));
  }

  #[test]
  fn meshopt_divider_covers_every_triangle() {
    let (mesh, meshlets) = meshopt_on_grid(10, 10, 64, 378);
    assert_covers(&mesh, &meshlets, 64, 378);
  }

  #[test]
  fn meshopt_divider_clamps_large_budget() {
    let (mesh, meshlets) = meshopt_on_grid(40, 40, 256, 3000);
    assert_covers(&mesh, &meshlets, 256, 3000);
    assert!(meshlets.len() > 1);
    for meshlet in &meshlets {
      assert!(meshlet.vertex_count() <= 255);
      assert!(meshlet.geometry.triangle_count() <= 512);
    }
  }

  #[test]
  fn meshopt_divider_rounds_triangle_budget_down() {
    // 7 triangles are rounded down to 4.
    let (mesh, meshlets) = meshopt_on_grid(6, 6, 64, 21);
    assert_covers(&mesh, &meshlets, 64, 21);
    assert!(meshlets.iter().all(|m| m.geometry.triangle_count() <= 4));
  }

  #[test]
  fn meshopt_divider_falls_back_on_tiny_budget() {
    // 3 triangles round down to none.
    let (mesh, meshlets) = meshopt_on_grid(4, 4, 64, 9);
    assert_covers(&mesh, &meshlets, 64, 9);
    let basic = basic_meshlets_divider(&mesh.indices, &empty_model(), None, 64, 9);
    assert_eq!(meshlets.iter().map(|m| m.geometry.clone()).collect::<Vec<_>>(), basic);
  }

  #[test]
  fn meshopt_divider_falls_back_on_out_of_range_indices() {
    let vertices = [Vec3::ZERO, Vec3::X, Vec3::Y];
    let indices = [0, 1, 2, 2, 1, 5];
    let meshlets = meshopt_meshlets_divider(&vertices, &indices, &empty_model(), None, 64, 378, 0.0);
    assert_eq!(meshlets, basic_meshlets_divider(&indices, &empty_model(), None, 64, 378));
    assert_eq!(resolve_all(&meshlets), indices.to_vec());
  }
}
