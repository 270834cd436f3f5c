use std::path::Path;

use glam::{
  Vec2,
  Vec3,
};

use crate::error::{HalaMeshletError, HalaMeshletErrorKind};
use crate::scene::HalaVertex;
use super::super::cpu::{
  mesh::HalaMesh,
  model::HalaModel,
};

/// The glTF loader.
pub struct HalaGltfLoader;

/// The implementation of the glTF loader.
impl HalaGltfLoader {
  /// Load the glTF file from the given path.
  /// param path The path of the glTF file.
  /// return The loaded model.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<HalaModel, HalaMeshletError> {
    let path = path.as_ref();
    let (gltf, buffers, _) = gltf::import(path)
      .map_err(|err| HalaMeshletError::new(HalaMeshletErrorKind::Loading, &format!("Load glTF file \"{:?}\" failed.", path), Some(Box::new(err))))?;
    let name = path.file_stem()
      .map_or("<Unnamed>".to_owned(), |stem| stem.to_string_lossy().to_string());
    Self::load_document(&name, &gltf, &buffers)
  }

  /// Load the glTF data from memory.
  /// param name The name of the model.
  /// param data The glTF or GLB bytes.
  /// return The loaded model.
  pub fn load_slice(name: &str, data: &[u8]) -> Result<HalaModel, HalaMeshletError> {
    let (gltf, buffers, _) = gltf::import_slice(data)
      .map_err(|err| HalaMeshletError::new(HalaMeshletErrorKind::Loading, &format!("Load glTF data \"{}\" failed.", name), Some(Box::new(err))))?;
    Self::load_document(name, &gltf, &buffers)
  }

  /// Load all meshes of the document, one model mesh per triangle primitive.
  /// param name The name of the model.
  /// param gltf The glTF document.
  /// param buffers The glTF buffers.
  /// return The loaded model.
  fn load_document(name: &str, gltf: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Result<HalaModel, HalaMeshletError> {
    if gltf.scenes().len() > 1 {
      log::warn!("More than one scene in glTF \"{}\". All meshes will be loaded regardless of the scene.", name);
    }

    let mut loaded_meshes = Vec::new();
    for mesh in gltf.meshes() {
      loaded_meshes.extend(Self::load_mesh(&mesh, buffers)?);
    }

    Ok(HalaModel::from_meshes(name, loaded_meshes))
  }

  /// Load the mesh.
  /// param mesh The gltf mesh.
  /// param buffers The gltf buffers.
  /// return The meshes made from the primitives.
  fn load_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<Vec<HalaMesh>, HalaMeshletError> {
    let mesh_name = mesh.name().unwrap_or("<Unnamed>");
    log::debug!("Loading mesh \"{}\".", mesh_name);

    let mut loaded_meshes = Vec::new();
    for primitive in mesh.primitives() {
      if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("Skip primitive {} of mesh \"{}\" with mode {:?}.", primitive.index(), mesh_name, primitive.mode());
        continue;
      }
      log::debug!("Loading primitive {} from mesh \"{}\".", primitive.index(), mesh_name);
      let reader = primitive.reader(|i| Some(&buffers[i.index()]));

      let positions = reader.read_positions()
        .ok_or(HalaMeshletError::new(HalaMeshletErrorKind::Loading, &format!("Read positions from mesh \"{}\" failed.", mesh_name), None))?
        .map(Vec3::from).collect::<Vec<_>>();
      // Non-indexed primitives draw their vertices in order.
      let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect::<Vec<_>>(),
        None => (0..positions.len() as u32).collect::<Vec<_>>(),
      };
      if let Some(&bad_index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(HalaMeshletError::new(
          HalaMeshletErrorKind::Loading,
          &format!("Index {} of mesh \"{}\" is out of range of {} vertices.", bad_index, mesh_name, positions.len()),
          None));
      }
      let normals = reader.read_normals()
        .map_or(vec![Vec3::ZERO; positions.len()], |normals| normals.map(Vec3::from).collect::<Vec<_>>());
      let tex_coords = reader.read_tex_coords(0)
        .map_or(vec![Vec2::ZERO; positions.len()], |tex_coords| tex_coords.into_f32().map(Vec2::from).collect::<Vec<_>>());

      let mut vertices = Vec::with_capacity(positions.len());
      for i in 0..positions.len() {
        vertices.push(HalaVertex {
          position: positions[i],
          normal: normals.get(i).copied().unwrap_or(Vec3::ZERO),
          tex_coord: tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
        });
      }

      let material_index = primitive.material().index().map_or(u32::MAX, |idx| idx as u32);

      loaded_meshes.push(HalaMesh {
        name: format!("{}.{}", mesh_name, primitive.index()),
        vertices,
        indices,
        material_index,
      });
    }

    Ok(loaded_meshes)
  }
}
