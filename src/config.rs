use std::path::{Path, PathBuf};

use serde::{
  Deserialize,
  Serialize,
};

use crate::error::HalaMeshletError;
use crate::meshlet::divider::validate_budget;
use crate::meshlet::gpu::{
  HalaMeshletGpuFormat,
  HALA_DEFAULT_MESHLET_VERTICES,
  HALA_DEFAULT_MESHLET_INDICES,
};

fn default_max_vertices() -> u32 {
  HALA_DEFAULT_MESHLET_VERTICES as u32
}

fn default_max_indices() -> u32 {
  HALA_DEFAULT_MESHLET_INDICES as u32
}

fn default_as_true() -> bool {
  true
}

/// The meshlet build configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalaMeshletConfig {
  #[serde(default = "default_max_vertices")]
  pub max_vertices: u32,
  #[serde(default = "default_max_indices")]
  pub max_indices: u32,
  #[serde(default = "default_as_true")]
  pub combine_submeshes: bool,
  #[serde(default)]
  pub format: HalaMeshletGpuFormat,
  #[serde(default)]
  pub cache_dir: Option<PathBuf>,
}

impl Default for HalaMeshletConfig {
  fn default() -> Self {
    HalaMeshletConfig {
      max_vertices: default_max_vertices(),
      max_indices: default_max_indices(),
      combine_submeshes: true,
      format: HalaMeshletGpuFormat::Fixed,
      cache_dir: None,
    }
  }
}

/// The implementation of the meshlet build configuration.
impl HalaMeshletConfig {
  /// Parse the configuration from JSON.
  /// param json: The JSON text.
  /// return: The validated configuration.
  pub fn from_str(json: &str) -> Result<Self, HalaMeshletError> {
    let config = serde_json::from_str::<Self>(json)?;
    config.validate()?;
    Ok(config)
  }

  /// Load the configuration from a JSON file.
  /// param path: The path of the file.
  /// return: The validated configuration.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaMeshletError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let config = Self::from_str(&json)?;
    log::debug!("Loaded meshlet config \"{:?}\": {:?}.", path, config);
    Ok(config)
  }

  /// Check the budget of the configuration.
  /// return: The result.
  pub fn validate(&self) -> Result<(), HalaMeshletError> {
    validate_budget(self.max_vertices, self.max_indices)
  }

  /// Get the cache file path of a named meshlet set.
  /// The file name carries everything the cached data depends on: the budget, the submesh
  /// handling and, for the fixed layout, the NV/NI capacity of the GPU records.
  /// param name: The name, e.g. mesh name and index.
  /// return: The path, None if no cache directory is configured.
  pub fn cache_path<const NV: usize, const NI: usize>(&self, name: &str) -> Option<PathBuf> {
    let submeshes = if self.combine_submeshes { "combined" } else { "separate" };
    let file_name = match self.format {
      HalaMeshletGpuFormat::Fixed => format!(
        "direct_meshlets-{}-{}v{}i-{}-{}x{}.cache", name, self.max_vertices, self.max_indices, submeshes, NV, NI),
      HalaMeshletGpuFormat::Redirected => format!(
        "indirect_meshlets-{}-{}v{}i-{}.cache", name, self.max_vertices, self.max_indices, submeshes),
    };
    self.cache_dir.as_ref()
      .map(|dir| dir.join(file_name))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::HalaMeshletErrorKind;

  #[test]
  fn missing_fields_take_defaults() {
    let config = HalaMeshletConfig::from_str("{}").unwrap();
    assert_eq!(config, HalaMeshletConfig::default());
    assert_eq!(config.max_vertices, 64);
    assert_eq!(config.max_indices, 378);
  }

  #[test]
  fn parses_all_fields() {
    let config = HalaMeshletConfig::from_str(r#"{
      "max_vertices": 32,
      "max_indices": 96,
      "combine_submeshes": false,
      "format": "redirected",
      "cache_dir": "cache"
    }"#).unwrap();
    assert_eq!(config.max_vertices, 32);
    assert!(!config.combine_submeshes);
    assert_eq!(config.format, HalaMeshletGpuFormat::Redirected);
    assert_eq!(
      config.cache_path::<64, 378>("bunny-0"),
      Some(PathBuf::from("cache").join("indirect_meshlets-bunny-0-32v96i-separate.cache")));
  }

  #[test]
  fn cache_path_follows_the_build_parameters() {
    let config = HalaMeshletConfig {
      cache_dir: Some(PathBuf::from("cache")),
      ..Default::default()
    };
    let path = config.cache_path::<64, 378>("bunny");
    assert_eq!(path, Some(PathBuf::from("cache").join("direct_meshlets-bunny-64v378i-combined-64x378.cache")));
    assert_ne!(config.cache_path::<128, 378>("bunny"), path);

    let smaller = HalaMeshletConfig { max_vertices: 32, ..config.clone() };
    assert_ne!(smaller.cache_path::<64, 378>("bunny"), path);
    let fewer = HalaMeshletConfig { max_indices: 126, ..config.clone() };
    assert_ne!(fewer.cache_path::<64, 378>("bunny"), path);
    let separate = HalaMeshletConfig { combine_submeshes: false, ..config.clone() };
    assert_ne!(separate.cache_path::<64, 378>("bunny"), path);

    // The redirected layout does not depend on the record capacity.
    let redirected = HalaMeshletConfig { format: HalaMeshletGpuFormat::Redirected, ..config };
    assert_eq!(redirected.cache_path::<64, 378>("bunny"), redirected.cache_path::<128, 512>("bunny"));
  }

  #[test]
  fn rejects_invalid_budget() {
    let err = HalaMeshletConfig::from_str(r#"{ "max_vertices": 1000 }"#).unwrap_err();
    assert_eq!(err.kind(), HalaMeshletErrorKind::Configuration);
    let err = HalaMeshletConfig::from_str(r#"{ "format": "sparse" }"#).unwrap_err();
    assert_eq!(err.kind(), HalaMeshletErrorKind::Configuration);
  }

  #[test]
  fn no_cache_dir_no_cache_path() {
    assert!(HalaMeshletConfig::default().cache_path::<64, 378>("x").is_none());
  }
}
