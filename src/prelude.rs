pub use crate::error::{HalaMeshletError, HalaMeshletErrorKind};
pub use crate::config::HalaMeshletConfig;
pub use crate::serializer::{
  HalaSerializerMode,
  HalaSerializerTrait,
  HalaSerializer,
};
pub use crate::scene::{
  HalaVertex,
  HalaMesh,
  HalaMeshIndex,
  HalaModel,
};
pub use crate::meshlet::{
  HalaMeshlet,
  HalaMeshletGeometry,
  HalaModelSelection,
  HalaMeshletDivision,
  HalaMeshletGpuData,
  HalaMeshletRedirectedGpuData,
  HalaMeshletGpuFormat,
  HalaMeshletGpuOutput,
  make_model_selection,
  make_model_selection_all,
  divide_into_meshlets,
  convert_for_gpu_usage,
  build_gpu_meshlets,
};
