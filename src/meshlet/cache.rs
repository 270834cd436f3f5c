use crate::error::HalaMeshletError;
use crate::serializer::{HalaSerializerMode, HalaSerializerTrait};
use super::cpu::HalaMeshlet;
use super::gpu::{
  HalaMeshletGpuFormat,
  HalaMeshletGpuOutput,
  convert_for_gpu_usage,
};

/// Archive the converted meshlets: the GPU meshlets first, then the data pool if there is one.
/// Both saving and loading go through here, so the order can not diverge.
fn archive_gpu_output<const NV: usize, const NI: usize, S: HalaSerializerTrait>(
  serializer: &mut S,
  output: &mut HalaMeshletGpuOutput<NV, NI>,
) -> Result<(), HalaMeshletError> {
  match output {
    HalaMeshletGpuOutput::Fixed(meshlets) => {
      serializer.archive(meshlets)?;
    },
    HalaMeshletGpuOutput::Redirected { meshlets, data } => {
      serializer.archive(meshlets)?;
      serializer.archive(data)?;
    },
  }
  Ok(())
}

fn check_mode<S: HalaSerializerTrait>(serializer: &S, expected: HalaSerializerMode) -> Result<(), HalaMeshletError> {
  if serializer.mode() != expected {
    return Err(HalaMeshletError::configuration(&format!(
      "The serializer is in {:?} mode, {:?} mode is required.", serializer.mode(), expected)));
  }
  Ok(())
}

/// Convert the meshlets for GPU usage and write the result to the serializer.
/// param serializer: The serializer, must be in serialize mode.
/// param meshlets: The meshlets.
/// param format: The GPU layout.
/// return: The converted meshlets.
pub fn save<const NV: usize, const NI: usize, S: HalaSerializerTrait>(
  serializer: &mut S,
  meshlets: &[HalaMeshlet],
  format: HalaMeshletGpuFormat,
) -> Result<HalaMeshletGpuOutput<NV, NI>, HalaMeshletError> {
  check_mode(serializer, HalaSerializerMode::Serialize)?;

  let mut output = convert_for_gpu_usage::<NV, NI>(meshlets, format)?;
  archive_gpu_output(serializer, &mut output)?;
  log::debug!("Saved {} {:?} GPU meshlets.", output.len(), format);
  Ok(output)
}

/// Read converted meshlets from the serializer without any CPU meshlets.
/// param serializer: The serializer, must be in deserialize mode.
/// param format: The GPU layout the data was saved with.
/// return: The converted meshlets.
pub fn load<const NV: usize, const NI: usize, S: HalaSerializerTrait>(
  serializer: &mut S,
  format: HalaMeshletGpuFormat,
) -> Result<HalaMeshletGpuOutput<NV, NI>, HalaMeshletError> {
  check_mode(serializer, HalaSerializerMode::Deserialize)?;

  let mut output = match format {
    HalaMeshletGpuFormat::Fixed => HalaMeshletGpuOutput::Fixed(Vec::new()),
    HalaMeshletGpuFormat::Redirected => HalaMeshletGpuOutput::Redirected {
      meshlets: Vec::new(),
      data: Vec::new(),
    },
  };
  archive_gpu_output(serializer, &mut output)?;
  log::debug!("Loaded {} {:?} GPU meshlets.", output.len(), format);
  Ok(output)
}

/// Save or load depending on the mode of the serializer.
/// The meshlets are only generated when saving.
/// param serializer: The serializer.
/// param format: The GPU layout.
/// param make_meshlets: Generates the CPU meshlets.
/// return: The converted meshlets.
pub fn convert_for_gpu_usage_cached<const NV: usize, const NI: usize, S, F>(
  serializer: &mut S,
  format: HalaMeshletGpuFormat,
  make_meshlets: F,
) -> Result<HalaMeshletGpuOutput<NV, NI>, HalaMeshletError>
where
  S: HalaSerializerTrait,
  F: FnOnce() -> Result<Vec<HalaMeshlet>, HalaMeshletError>,
{
  match serializer.mode() {
    HalaSerializerMode::Serialize => {
      let meshlets = make_meshlets()?;
      save::<NV, NI, S>(serializer, &meshlets, format)
    },
    HalaSerializerMode::Deserialize => load::<NV, NI, S>(serializer, format),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::error::HalaMeshletErrorKind;
  use crate::meshlet::accessor::make_model_selection_all;
  use crate::meshlet::divider::{HalaMeshletDivision, divide_into_meshlets};
  use crate::scene::{HalaMesh, HalaModel};
  use crate::serializer::HalaSerializer;

  fn meshlets() -> Vec<HalaMeshlet> {
    let positions = (0..40).map(|i| glam::Vec3::new(i as f32, (i % 3) as f32, 0.0)).collect::<Vec<_>>();
    let indices = (0..38).flat_map(|i| [i, i + 1, i + 2]).collect::<Vec<u32>>();
    let model = Arc::new(HalaModel::from_meshes("strip", vec![HalaMesh::from_positions("strip", &positions, indices)]));
    divide_into_meshlets(&[make_model_selection_all(&model)], &HalaMeshletDivision::default(), true, 10, 16).unwrap()
  }

  #[test]
  fn fixed_round_trip_is_identical() {
    let meshlets = meshlets();
    let mut serializer = HalaSerializer::to_memory().unwrap();
    let saved = save::<16, 16, _>(&mut serializer, &meshlets, HalaMeshletGpuFormat::Fixed).unwrap();
    let bytes = serializer.finish().unwrap().unwrap();

    let mut serializer = HalaSerializer::from_memory(bytes).unwrap();
    let loaded = load::<16, 16, _>(&mut serializer, HalaMeshletGpuFormat::Fixed).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded, convert_for_gpu_usage::<16, 16>(&meshlets, HalaMeshletGpuFormat::Fixed).unwrap());
  }

  #[test]
  fn redirected_round_trip_is_identical() {
    let meshlets = meshlets();
    let mut serializer = HalaSerializer::to_memory().unwrap();
    let saved = save::<64, 378, _>(&mut serializer, &meshlets, HalaMeshletGpuFormat::Redirected).unwrap();
    let bytes = serializer.finish().unwrap().unwrap();

    let mut serializer = HalaSerializer::from_memory(bytes).unwrap();
    let loaded = load::<64, 378, _>(&mut serializer, HalaMeshletGpuFormat::Redirected).unwrap();
    assert_eq!(loaded, saved);
    assert!(!loaded.data().unwrap().is_empty());
  }

  #[test]
  fn load_never_generates_meshlets() {
    let mut serializer = HalaSerializer::to_memory().unwrap();
    let saved = convert_for_gpu_usage_cached::<64, 378, _, _>(
      &mut serializer, HalaMeshletGpuFormat::Redirected, || Ok(meshlets())).unwrap();
    let bytes = serializer.finish().unwrap().unwrap();

    let mut serializer = HalaSerializer::from_memory(bytes).unwrap();
    let loaded = convert_for_gpu_usage_cached::<64, 378, _, _>(
      &mut serializer, HalaMeshletGpuFormat::Redirected, || panic!("meshlets must not be generated when loading")).unwrap();
    assert_eq!(loaded, saved);
  }

  #[test]
  fn wrong_mode_is_a_configuration_error() {
    let mut serializer = HalaSerializer::to_memory().unwrap();
    let err = load::<64, 378, _>(&mut serializer, HalaMeshletGpuFormat::Fixed).unwrap_err();
    assert_eq!(err.kind(), HalaMeshletErrorKind::Configuration);
  }

  #[test]
  fn fixed_capacity_mismatch_fails_to_load() {
    let meshlets = meshlets();
    let mut serializer = HalaSerializer::to_memory().unwrap();
    save::<16, 16, _>(&mut serializer, &meshlets, HalaMeshletGpuFormat::Fixed).unwrap();
    let bytes = serializer.finish().unwrap().unwrap();

    let mut serializer = HalaSerializer::from_memory(bytes).unwrap();
    let err = load::<64, 378, _>(&mut serializer, HalaMeshletGpuFormat::Fixed).unwrap_err();
    assert_eq!(err.kind(), HalaMeshletErrorKind::Serialization);
  }

  #[test]
  fn empty_round_trip() {
    let mut serializer = HalaSerializer::to_memory().unwrap();
    let saved = save::<64, 378, _>(&mut serializer, &[], HalaMeshletGpuFormat::Redirected).unwrap();
    let bytes = serializer.finish().unwrap().unwrap();
    let mut serializer = HalaSerializer::from_memory(bytes).unwrap();
    let loaded = load::<64, 378, _>(&mut serializer, HalaMeshletGpuFormat::Redirected).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded, saved);
  }
}
