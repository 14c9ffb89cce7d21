//! The unit of work flowing through a pipeline: metadata plus contents.
//!
//! ## Why split metadata from contents?
//!
//! A streamed file's contents are a one-shot [`ChunkStream`] that can be
//! neither cloned nor shared. The transform still needs to see *which* file it
//! is working on when the stream finally ends, long after the [`File`] itself
//! has moved downstream. Keeping the path and attributes in a separate,
//! cheaply clonable [`FileMeta`] lets the content collector carry its own copy
//! without holding on to the file.

use crate::error::StageError;
use futures::stream::{self, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncReadExt;
use tokio_stream::Stream;
use tracing::debug;

/// Chunk size used when a file is loaded in streaming mode.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of content chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, StageError>> + Send>>;

/// Path and free-form attributes of a file; passed through the stage unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Working directory the pipeline was started from.
    pub cwd: PathBuf,
    /// Base directory `relative()` is computed against.
    pub base: PathBuf,
    /// Full path of the file.
    pub path: PathBuf,
    /// Arbitrary metadata attached by upstream stages.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl FileMeta {
    /// Metadata for `path`, with `base` set to the path's parent directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let cwd = std::env::current_dir().unwrap_or_default();
        Self {
            cwd,
            base,
            path,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Path relative to `base`; the full path when it is not under `base`.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }

    pub fn basename(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Extension including the leading dot, e.g. `".js"`.
    pub fn extname(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
    }
}

/// How a file's contents are represented.
pub enum Contents {
    /// Fully materialised in memory.
    Buffer(Vec<u8>),
    /// Delivered incrementally; read lazily by whoever consumes the file.
    Stream(ChunkStream),
    /// No contents (directories, files read with contents disabled).
    Null,
}

impl Contents {
    /// Streamed contents yielding `chunks` in order.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Contents::Stream(Box::pin(stream::iter(chunks.into_iter().map(Ok::<_, StageError>))))
    }

    /// Streamed contents backed by any fallible byte-chunk stream.
    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static,
    {
        Contents::Stream(Box::pin(chunks.map_err(StageError::from)))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, Contents::Buffer(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Contents::Stream(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Contents::Null)
    }

    /// Materialise the contents, draining a stream if necessary.
    ///
    /// Returns `Ok(None)` for [`Contents::Null`]. Reading a stream is where a
    /// flush-time transform failure of a streamed file surfaces.
    pub async fn read_all(self) -> Result<Option<Vec<u8>>, StageError> {
        match self {
            Contents::Buffer(bytes) => Ok(Some(bytes)),
            Contents::Stream(chunks) => {
                let chunks: Vec<Vec<u8>> = chunks.try_collect().await?;
                Ok(Some(chunks.concat()))
            }
            Contents::Null => Ok(None),
        }
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Contents::Stream(_) => f.write_str("Stream(<dyn Stream>)"),
            Contents::Null => f.write_str("Null"),
        }
    }
}

impl From<Vec<u8>> for Contents {
    fn from(bytes: Vec<u8>) -> Self {
        Contents::Buffer(bytes)
    }
}

/// Whether [`File::load`] buffers the whole file or streams it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadMode {
    #[default]
    Buffer,
    Stream,
}

/// One file flowing through the pipeline.
#[derive(Debug)]
pub struct File {
    pub meta: FileMeta,
    pub contents: Contents,
}

impl File {
    pub fn new(meta: FileMeta, contents: Contents) -> Self {
        Self { meta, contents }
    }

    /// A file with buffered contents.
    pub fn buffered(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(FileMeta::new(path), Contents::Buffer(bytes.into()))
    }

    /// A file whose contents stream `chunks` in order.
    pub fn streamed<I>(path: impl Into<PathBuf>, chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(FileMeta::new(path), Contents::from_chunks(chunks))
    }

    /// A file without contents.
    pub fn null(path: impl Into<PathBuf>) -> Self {
        Self::new(FileMeta::new(path), Contents::Null)
    }

    pub fn path(&self) -> &Path {
        &self.meta.path
    }

    pub fn is_buffer(&self) -> bool {
        self.contents.is_buffer()
    }

    pub fn is_stream(&self) -> bool {
        self.contents.is_stream()
    }

    pub fn is_null(&self) -> bool {
        self.contents.is_null()
    }

    /// Read a file from disk.
    ///
    /// In [`LoadMode::Buffer`] the whole file is read before returning. In
    /// [`LoadMode::Stream`] the file is opened eagerly (so a missing file is
    /// reported here) and read lazily in [`STREAM_CHUNK_SIZE`] chunks.
    pub async fn load(path: impl AsRef<Path>, mode: LoadMode) -> Result<File, StageError> {
        let path = path.as_ref();
        let io_err = |source| StageError::Io {
            path: path.to_path_buf(),
            source,
        };

        let contents = match mode {
            LoadMode::Buffer => {
                let bytes = tokio::fs::read(path).await.map_err(io_err)?;
                debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
                Contents::Buffer(bytes)
            }
            LoadMode::Stream => {
                let handle = tokio::fs::File::open(path).await.map_err(io_err)?;
                debug!("Opened {} for streaming", path.display());
                Contents::from_stream(read_chunks(handle))
            }
        };

        Ok(File::new(FileMeta::new(path), contents))
    }
}

/// Lazily read `handle` in fixed-size chunks until EOF.
fn read_chunks(
    handle: tokio::fs::File,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send {
    stream::try_unfold(handle, |mut handle| async move {
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let n = handle.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((buf, handle)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn meta_path_helpers() {
        let meta = FileMeta::new("/project/src/app/main.js").with_base("/project/src");
        assert_eq!(meta.relative(), Path::new("app/main.js"));
        assert_eq!(meta.basename(), Some("main.js"));
        assert_eq!(meta.extname().as_deref(), Some(".js"));
    }

    #[test]
    fn meta_relative_outside_base_is_full_path() {
        let meta = FileMeta::new("/other/file.txt").with_base("/project");
        assert_eq!(meta.relative(), Path::new("/other/file.txt"));
    }

    #[test]
    fn meta_attributes() {
        let meta = FileMeta::new("a.md").with_attribute("layout", "post");
        assert_eq!(meta.attribute("layout"), Some(&serde_json::json!("post")));
        assert!(meta.attribute("missing").is_none());
    }

    #[test]
    fn content_predicates() {
        assert!(File::buffered("a", b"x".to_vec()).is_buffer());
        assert!(File::streamed("a", vec![b"x".to_vec()]).is_stream());
        assert!(File::null("a").is_null());
    }

    #[tokio::test]
    async fn read_all_concatenates_stream() {
        let contents = Contents::from_chunks(vec![b"ab".to_vec(), b"cd".to_vec()]);
        assert_eq!(contents.read_all().await.unwrap(), Some(b"abcd".to_vec()));
        assert_eq!(Contents::Null.read_all().await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_buffer_and_stream_modes_agree() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let payload: Vec<u8> = (0..(STREAM_CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&payload).unwrap();

        let buffered = File::load(tmp.path(), LoadMode::Buffer).await.unwrap();
        assert!(buffered.is_buffer());
        assert_eq!(buffered.path(), tmp.path());

        let streamed = File::load(tmp.path(), LoadMode::Stream).await.unwrap();
        assert!(streamed.is_stream());

        let a = buffered.contents.read_all().await.unwrap();
        let b = streamed.contents.read_all().await.unwrap();
        assert_eq!(a.as_deref(), Some(payload.as_slice()));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let err = File::load("/definitely/not/here.txt", LoadMode::Stream)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Io { .. }));
    }
}
