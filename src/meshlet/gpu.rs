use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer,
};

use crate::error::HalaMeshletError;
use super::cpu::HalaMeshlet;

/// The default vertex capacity of a fixed GPU meshlet.
pub const HALA_DEFAULT_MESHLET_VERTICES: usize = 64;
/// The default index capacity of a fixed GPU meshlet.
pub const HALA_DEFAULT_MESHLET_INDICES: usize = 378;

/// The meshlet for GPU usage with all of its data inline.
/// NV is the vertex capacity, NI is the index capacity.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HalaMeshletGpuData<const NV: usize = HALA_DEFAULT_MESHLET_VERTICES, const NI: usize = HALA_DEFAULT_MESHLET_INDICES> {
  /// Vertex indices into the vertex array, unused slots are zero.
  pub vertices: [u32; NV],
  /// Indices into `vertices`, unused slots are zero.
  pub indices: [u8; NI],
  pub vertex_count: u32,
  pub primitive_count: u32,
}

impl<const NV: usize, const NI: usize> Default for HalaMeshletGpuData<NV, NI> {
  fn default() -> Self {
    Self {
      vertices: [0; NV],
      indices: [0; NI],
      vertex_count: 0,
      primitive_count: 0,
    }
  }
}

/// The implementation of the fixed GPU meshlet.
impl<const NV: usize, const NI: usize> HalaMeshletGpuData<NV, NI> {
  pub const NUM_VERTICES: usize = NV;
  pub const NUM_INDICES: usize = NI;

  /// Convert a meshlet, failing if it is malformed or does not fit.
  /// param meshlet: The meshlet.
  /// return: The GPU meshlet.
  pub fn from_meshlet(meshlet: &HalaMeshlet) -> Result<Self, HalaMeshletError> {
    meshlet.geometry.validate(u32::MAX, u32::MAX)?;
    let vertex_count = meshlet.vertex_count() as usize;
    let index_count = meshlet.index_count() as usize;
    if vertex_count > NV || index_count > NI {
      return Err(HalaMeshletError::capacity(&format!(
        "The meshlet with {} vertices and {} indices does not fit into a GPU meshlet of {} vertices and {} indices.",
        vertex_count, index_count, NV, NI)));
    }

    let mut gpu_meshlet = Self::default();
    gpu_meshlet.vertices[..vertex_count].copy_from_slice(&meshlet.vertices()[..vertex_count]);
    gpu_meshlet.indices[..index_count].copy_from_slice(&meshlet.indices()[..index_count]);
    gpu_meshlet.vertex_count = vertex_count as u32;
    gpu_meshlet.primitive_count = (index_count / 3) as u32;
    Ok(gpu_meshlet)
  }
}

#[derive(Serialize)]
struct HalaMeshletGpuDataRef<'a> {
  vertices: &'a [u32],
  indices: &'a [u8],
  vertex_count: u32,
  primitive_count: u32,
}

#[derive(Deserialize)]
struct HalaMeshletGpuDataOwned {
  vertices: Vec<u32>,
  indices: Vec<u8>,
  vertex_count: u32,
  primitive_count: u32,
}

/// Serde has no arrays of arbitrary length, so the arrays are written as sequences.
impl<const NV: usize, const NI: usize> Serialize for HalaMeshletGpuData<NV, NI> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    HalaMeshletGpuDataRef {
      vertices: &self.vertices,
      indices: &self.indices,
      vertex_count: self.vertex_count,
      primitive_count: self.primitive_count,
    }.serialize(serializer)
  }
}

impl<'de, const NV: usize, const NI: usize> Deserialize<'de> for HalaMeshletGpuData<NV, NI> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let owned = HalaMeshletGpuDataOwned::deserialize(deserializer)?;
    if owned.vertices.len() != NV || owned.indices.len() != NI {
      return Err(serde::de::Error::custom(format!(
        "GPU meshlet capacity mismatch, read {} vertices and {} indices, expected {} and {}.",
        owned.vertices.len(), owned.indices.len(), NV, NI)));
    }

    let mut gpu_meshlet = Self::default();
    gpu_meshlet.vertices.copy_from_slice(&owned.vertices);
    gpu_meshlet.indices.copy_from_slice(&owned.indices);
    gpu_meshlet.vertex_count = owned.vertex_count;
    gpu_meshlet.primitive_count = owned.primitive_count;
    Ok(gpu_meshlet)
  }
}

/// The meshlet for GPU usage whose data lives in the shared meshlet data pool.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalaMeshletRedirectedGpuData {
  /// Offset into the meshlet data pool in words.
  pub data_offset: u32,
  pub vertex_count: u32,
  pub primitive_count: u32,
}

/// The implementation of the redirected GPU meshlet.
impl HalaMeshletRedirectedGpuData {
  /// Get the number of pool words holding the packed local indices.
  pub fn index_word_count(&self) -> u32 {
    (self.primitive_count * 3).div_ceil(4)
  }

  /// Get the range of the vertex index words in the pool.
  pub fn vertex_range(&self) -> std::ops::Range<usize> {
    let begin = self.data_offset as usize;
    begin..begin + self.vertex_count as usize
  }

  /// Get the range of the packed index words in the pool.
  pub fn index_range(&self) -> std::ops::Range<usize> {
    let begin = self.data_offset as usize + self.vertex_count as usize;
    begin..begin + self.index_word_count() as usize
  }

  /// Unpack the local indices of this meshlet from the pool.
  /// param data: The meshlet data pool.
  /// return: The local indices, three per primitive, None if the pool is too short.
  pub fn unpack_indices(&self, data: &[u32]) -> Option<Vec<u8>> {
    let mut indices = data.get(self.index_range())?.iter()
      .flat_map(|word| word.to_le_bytes())
      .collect::<Vec<_>>();
    indices.truncate(self.primitive_count as usize * 3);
    Some(indices)
  }
}

/// The GPU meshlet layouts.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalaMeshletGpuFormat {
  /// One `HalaMeshletGpuData` per meshlet.
  #[default]
  Fixed,
  /// One `HalaMeshletRedirectedGpuData` per meshlet plus the meshlet data pool.
  Redirected,
}

/// The converted meshlets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalaMeshletGpuOutput<const NV: usize = HALA_DEFAULT_MESHLET_VERTICES, const NI: usize = HALA_DEFAULT_MESHLET_INDICES> {
  Fixed(Vec<HalaMeshletGpuData<NV, NI>>),
  Redirected {
    meshlets: Vec<HalaMeshletRedirectedGpuData>,
    data: Vec<u32>,
  },
}

/// The implementation of the converted meshlets.
impl<const NV: usize, const NI: usize> HalaMeshletGpuOutput<NV, NI> {
  pub fn format(&self) -> HalaMeshletGpuFormat {
    match self {
      Self::Fixed(_) => HalaMeshletGpuFormat::Fixed,
      Self::Redirected { .. } => HalaMeshletGpuFormat::Redirected,
    }
  }

  /// Get the number of meshlets.
  pub fn len(&self) -> usize {
    match self {
      Self::Fixed(meshlets) => meshlets.len(),
      Self::Redirected { meshlets, .. } => meshlets.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Get the meshlet data pool, only the redirected layout has one.
  pub fn data(&self) -> Option<&[u32]> {
    match self {
      Self::Fixed(_) => None,
      Self::Redirected { data, .. } => Some(data),
    }
  }
}

/// Convert meshlets into the fixed GPU layout.
/// param meshlets: The meshlets.
/// return: The GPU meshlets, or a capacity error if any meshlet does not fit.
pub fn convert_to_fixed_gpu_data<const NV: usize, const NI: usize>(
  meshlets: &[HalaMeshlet],
) -> Result<Vec<HalaMeshletGpuData<NV, NI>>, HalaMeshletError> {
  let gpu_meshlets = meshlets.iter()
    .map(HalaMeshletGpuData::<NV, NI>::from_meshlet)
    .collect::<Result<Vec<_>, _>>()?;
  log::debug!("Converted {} meshlets into GPU meshlets of {} vertices and {} indices.", gpu_meshlets.len(), NV, NI);
  Ok(gpu_meshlets)
}

/// Convert meshlets into the redirected GPU layout.
/// For each meshlet the pool holds its vertex indices followed by its local indices, four bytes per word.
/// The last word of the local indices is zero padded.
/// param meshlets: The meshlets.
/// return: The GPU meshlets and the meshlet data pool, or a configuration error for a malformed meshlet.
pub fn convert_to_redirected_gpu_data(
  meshlets: &[HalaMeshlet],
) -> Result<(Vec<HalaMeshletRedirectedGpuData>, Vec<u32>), HalaMeshletError> {
  let mut gpu_meshlets = Vec::with_capacity(meshlets.len());
  let mut data = Vec::new();
  for meshlet in meshlets {
    meshlet.geometry.validate(u32::MAX, u32::MAX)?;
    let vertex_count = meshlet.vertex_count() as usize;
    let index_count = meshlet.index_count() as usize;
    gpu_meshlets.push(HalaMeshletRedirectedGpuData {
      data_offset: data.len() as u32,
      vertex_count: vertex_count as u32,
      primitive_count: (index_count / 3) as u32,
    });

    data.extend_from_slice(&meshlet.vertices()[..vertex_count]);
    data.extend(meshlet.indices()[..index_count].chunks(4).map(|group| {
      let mut bytes = [0u8; 4];
      bytes[..group.len()].copy_from_slice(group);
      u32::from_le_bytes(bytes)
    }));
  }
  log::debug!("Converted {} meshlets into redirected GPU meshlets with {} data words.", gpu_meshlets.len(), data.len());
  Ok((gpu_meshlets, data))
}

/// Convert meshlets into the requested GPU layout.
/// param meshlets: The meshlets.
/// param format: The GPU layout.
/// return: The converted meshlets.
pub fn convert_for_gpu_usage<const NV: usize, const NI: usize>(
  meshlets: &[HalaMeshlet],
  format: HalaMeshletGpuFormat,
) -> Result<HalaMeshletGpuOutput<NV, NI>, HalaMeshletError> {
  match format {
    HalaMeshletGpuFormat::Fixed => Ok(HalaMeshletGpuOutput::Fixed(convert_to_fixed_gpu_data::<NV, NI>(meshlets)?)),
    HalaMeshletGpuFormat::Redirected => {
      let (meshlets, data) = convert_to_redirected_gpu_data(meshlets)?;
      Ok(HalaMeshletGpuOutput::Redirected { meshlets, data })
    },
  }
}
