pub mod cpu;
pub mod accessor;
pub mod divider;
pub mod gpu;
pub mod cache;

pub use cpu::{HalaMeshlet, HalaMeshletGeometry};
pub use accessor::{
  HalaModelSelection,
  HalaMeshGeometry,
  make_model_selection,
  make_model_selection_all,
  get_vertices_and_indices,
  get_mesh_vertices_and_indices,
};
pub use divider::{
  HalaMeshletDivision,
  basic_meshlets_divider,
  meshopt_meshlets_divider,
  divide_indexed_geometry_into_meshlets,
  divide_into_meshlets,
};
pub use gpu::{
  HalaMeshletGpuData,
  HalaMeshletRedirectedGpuData,
  HalaMeshletGpuFormat,
  HalaMeshletGpuOutput,
  convert_to_fixed_gpu_data,
  convert_to_redirected_gpu_data,
  convert_for_gpu_usage,
};

use crate::config::HalaMeshletConfig;
use crate::error::HalaMeshletError;
use crate::serializer::HalaSerializer;

/// Divide the selections into meshlets and convert them for GPU usage as configured.
/// If the configuration has a cache directory, the result is loaded from the cache file of `name`
/// when it exists and is readable, and written to it otherwise.
/// A failed build leaves no cache file behind.
/// param selections: The models and their meshes.
/// param division: The division strategy.
/// param config: The configuration.
/// param name: The cache name of this meshlet set.
/// return: The converted meshlets.
pub fn build_gpu_meshlets<const NV: usize, const NI: usize>(
  selections: &[HalaModelSelection],
  division: &HalaMeshletDivision,
  config: &HalaMeshletConfig,
  name: &str,
) -> Result<HalaMeshletGpuOutput<NV, NI>, HalaMeshletError> {
  config.validate()?;
  let make_meshlets = || divide_into_meshlets(
    selections,
    division,
    config.combine_submeshes,
    config.max_vertices,
    config.max_indices);

  let path = match config.cache_path::<NV, NI>(name) {
    Some(path) => path,
    None => return convert_for_gpu_usage::<NV, NI>(&make_meshlets()?, config.format),
  };

  if path.is_file() {
    let loaded = HalaSerializer::from_file(&path)
      .and_then(|mut serializer| cache::load::<NV, NI, _>(&mut serializer, config.format));
    match loaded {
      Ok(output) => return Ok(output),
      Err(err) => {
        log::warn!("The meshlet cache \"{:?}\" is unreadable and will be rebuilt: {}", path, err);
        std::fs::remove_file(&path)?;
      },
    }
  }

  let mut serializer = HalaSerializer::to_file(&path)?;
  let output = cache::convert_for_gpu_usage_cached::<NV, NI, _, _>(&mut serializer, config.format, make_meshlets)?;
  serializer.finish()?;
  Ok(output)
}
