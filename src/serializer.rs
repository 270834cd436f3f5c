use std::fs::File;
use std::io::{
  BufReader,
  BufWriter,
  Cursor,
};
use std::path::{Path, PathBuf};

use serde::{
  de::DeserializeOwned,
  Deserialize,
  Serialize,
};

use crate::error::{HalaMeshletError, HalaMeshletErrorKind};

const HALA_SERIALIZER_MAGIC: [u8; 4] = *b"HMLC";
const HALA_SERIALIZER_VERSION: u32 = 1;

/// The direction a serializer works in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HalaSerializerMode {
  /// `archive` writes the value.
  Serialize,
  /// `archive` overwrites the value with what is read.
  Deserialize,
}

/// The serializer trait.
/// Values must be archived in the same order when writing and when reading.
pub trait HalaSerializerTrait {
  /// Get the mode of the serializer.
  fn mode(&self) -> HalaSerializerMode;

  /// Write the value, or overwrite it with the next value read.
  /// param value: The value.
  /// return: The result.
  fn archive<T: Serialize + DeserializeOwned>(&mut self, value: &mut T) -> Result<(), HalaMeshletError>;
}

#[derive(Serialize, Deserialize)]
struct HalaSerializerHeader {
  magic: [u8; 4],
  version: u32,
}

enum HalaSerializerStream {
  FileWriter(BufWriter<File>),
  FileReader(BufReader<File>),
  MemoryWriter(Vec<u8>),
  MemoryReader(Cursor<Vec<u8>>),
}

/// The bincode serializer over a file or a memory buffer.
/// A file is written to a temporary sibling and only moved into place by `finish`.
pub struct HalaSerializer {
  mode: HalaSerializerMode,
  stream: HalaSerializerStream,
  path: Option<PathBuf>,
  temp_path: Option<PathBuf>,
}

/// Get the temporary sibling of a file, e.g. "a.cache" -> "a.cache.tmp".
fn temp_path_of(path: &Path) -> PathBuf {
  let mut file_name = path.file_name()
    .map(|name| name.to_os_string())
    .unwrap_or_default();
  file_name.push(".tmp");
  path.with_file_name(file_name)
}

/// Replace a file with its written temporary sibling.
fn move_into_place(temp_path: &Path, path: &Path) -> std::io::Result<()> {
  #[cfg(windows)]
  {
    // Windows rename fails if the destination exists.
    if path.exists() {
      std::fs::remove_file(path)?;
    }
  }
  std::fs::rename(temp_path, path)
}

/// The implementation of the serializer.
impl HalaSerializer {
  /// Create a serializer writing to a file.
  /// The file is replaced when `finish` succeeds and left untouched otherwise.
  /// param path: The path of the file.
  /// return: The serializer.
  pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaMeshletError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    let temp_path = temp_path_of(path);
    let file = File::create(&temp_path)
      .map_err(|err| HalaMeshletError::new(HalaMeshletErrorKind::Io, &format!("Create cache file \"{:?}\" failed.", temp_path), Some(Box::new(err))))?;
    let mut serializer = Self {
      mode: HalaSerializerMode::Serialize,
      stream: HalaSerializerStream::FileWriter(BufWriter::new(file)),
      path: Some(path.to_path_buf()),
      temp_path: Some(temp_path),
    };
    serializer.archive_header()?;
    log::debug!("A HalaSerializer writing \"{:?}\" created.", path);
    Ok(serializer)
  }

  /// Create a serializer reading from a file.
  /// param path: The path of the file.
  /// return: The serializer.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaMeshletError> {
    let path = path.as_ref();
    let file = File::open(path)
      .map_err(|err| HalaMeshletError::new(HalaMeshletErrorKind::Io, &format!("Open cache file \"{:?}\" failed.", path), Some(Box::new(err))))?;
    let mut serializer = Self {
      mode: HalaSerializerMode::Deserialize,
      stream: HalaSerializerStream::FileReader(BufReader::new(file)),
      path: Some(path.to_path_buf()),
      temp_path: None,
    };
    serializer.archive_header()?;
    log::debug!("A HalaSerializer reading \"{:?}\" created.", path);
    Ok(serializer)
  }

  /// Create a serializer reading the file if it exists, writing it otherwise.
  /// param path: The path of the file.
  /// return: The serializer.
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HalaMeshletError> {
    let path = path.as_ref();
    if path.is_file() {
      Self::from_file(path)
    } else {
      Self::to_file(path)
    }
  }

  /// Create a serializer writing to memory.
  /// return: The serializer.
  pub fn to_memory() -> Result<Self, HalaMeshletError> {
    let mut serializer = Self {
      mode: HalaSerializerMode::Serialize,
      stream: HalaSerializerStream::MemoryWriter(Vec::new()),
      path: None,
      temp_path: None,
    };
    serializer.archive_header()?;
    Ok(serializer)
  }

  /// Create a serializer reading from memory.
  /// param bytes: The bytes written by a memory or file serializer.
  /// return: The serializer.
  pub fn from_memory(bytes: Vec<u8>) -> Result<Self, HalaMeshletError> {
    let mut serializer = Self {
      mode: HalaSerializerMode::Deserialize,
      stream: HalaSerializerStream::MemoryReader(Cursor::new(bytes)),
      path: None,
      temp_path: None,
    };
    serializer.archive_header()?;
    Ok(serializer)
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  /// Flush everything written and move a written file into place.
  /// return: The written bytes for a memory serializer, None otherwise.
  pub fn finish(mut self) -> Result<Option<Vec<u8>>, HalaMeshletError> {
    let stream = std::mem::replace(&mut self.stream, HalaSerializerStream::MemoryWriter(Vec::new()));
    match stream {
      HalaSerializerStream::FileWriter(writer) => {
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        drop(file);
        if let (Some(temp_path), Some(path)) = (self.temp_path.take(), self.path.as_ref()) {
          if let Err(err) = move_into_place(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(HalaMeshletError::new(
              HalaMeshletErrorKind::Io,
              &format!("Move cache file \"{:?}\" into place failed.", path),
              Some(Box::new(err))));
          }
          log::debug!("The cache file \"{:?}\" written.", path);
        }
        Ok(None)
      },
      HalaSerializerStream::MemoryWriter(bytes) => Ok(Some(bytes)),
      HalaSerializerStream::FileReader(_) | HalaSerializerStream::MemoryReader(_) => Ok(None),
    }
  }

  /// Write or read and check the header.
  fn archive_header(&mut self) -> Result<(), HalaMeshletError> {
    let mut header = HalaSerializerHeader {
      magic: HALA_SERIALIZER_MAGIC,
      version: HALA_SERIALIZER_VERSION,
    };
    self.archive(&mut header)?;
    if header.magic != HALA_SERIALIZER_MAGIC || header.version != HALA_SERIALIZER_VERSION {
      return Err(HalaMeshletError::new(
        HalaMeshletErrorKind::Serialization,
        &format!("Unsupported cache data {:?} version {}.", header.magic, header.version),
        None));
    }
    Ok(())
  }
}

/// The drop implementation of the serializer.
/// An unfinished file is thrown away.
impl Drop for HalaSerializer {
  fn drop(&mut self) {
    if let Some(temp_path) = self.temp_path.take() {
      self.stream = HalaSerializerStream::MemoryWriter(Vec::new());
      if std::fs::remove_file(&temp_path).is_ok() {
        log::debug!("The unfinished cache file \"{:?}\" removed.", temp_path);
      }
    }
  }
}

/// The implementation of the serializer trait for the bincode serializer.
impl HalaSerializerTrait for HalaSerializer {
  fn mode(&self) -> HalaSerializerMode {
    self.mode
  }

  fn archive<T: Serialize + DeserializeOwned>(&mut self, value: &mut T) -> Result<(), HalaMeshletError> {
    match &mut self.stream {
      HalaSerializerStream::FileWriter(writer) => bincode::serialize_into(writer, &*value)?,
      HalaSerializerStream::MemoryWriter(bytes) => bincode::serialize_into(bytes, &*value)?,
      HalaSerializerStream::FileReader(reader) => *value = bincode::deserialize_from(reader)?,
      HalaSerializerStream::MemoryReader(reader) => *value = bincode::deserialize_from(reader)?,
    }
    Ok(())
  }
}
