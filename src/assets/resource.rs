use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use crate::foundation::error::{CompositorError, CompositorResult};

/// Modification time reported when a resource cannot determine its own.
pub const UNKNOWN_MODIFIED: u64 = 0;

/// Source of encoded image bytes.
///
/// Implementations must provide a stable identity: two resources with the same `id()` are the same
/// resource for caching, ordering and build comparison.
pub trait ImageResource: Send + Sync + fmt::Debug {
    /// Stable identity string.
    fn id(&self) -> &str;

    /// Open a fresh stream over the encoded bytes.
    fn open_stream(&self) -> CompositorResult<Box<dyn Read + Send>>;

    /// Modification time in milliseconds since the Unix epoch, or [`UNKNOWN_MODIFIED`].
    fn modified_time(&self) -> u64;
}

/// Shared handle to an [`ImageResource`] with identity-based equality, ordering and hashing.
#[derive(Clone)]
pub struct Resource(Arc<dyn ImageResource>);

impl Resource {
    /// Wrap a resource implementation.
    pub fn new(inner: impl ImageResource + 'static) -> Self {
        Self(Arc::new(inner))
    }

    /// Wrap an already shared resource implementation.
    pub fn from_arc(inner: Arc<dyn ImageResource>) -> Self {
        Self(inner)
    }

    /// Convenience for a file-backed resource.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileResource::new(path))
    }

    /// Stable identity string.
    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Open a fresh stream over the encoded bytes.
    pub fn open_stream(&self) -> CompositorResult<Box<dyn Read + Send>> {
        self.0.open_stream()
    }

    /// Read the whole encoded payload.
    pub fn read_all(&self) -> CompositorResult<Vec<u8>> {
        let mut stream = self.open_stream()?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| CompositorError::io(format!("read resource '{}': {e}", self.id())))?;
        Ok(bytes)
    }

    /// Modification time in milliseconds since the Unix epoch, or [`UNKNOWN_MODIFIED`].
    pub fn modified_time(&self) -> u64 {
        self.0.modified_time()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resource").field(&self.id()).finish()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Resource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Resource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(other.id())
    }
}

/// Image stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    id: String,
}

impl FileResource {
    /// Create a resource for `path`. The identity is the path as given, with `\` normalized to `/`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = format!("file:{}", path.to_string_lossy().replace('\\', "/"));
        Self { path, id }
    }

    /// Filesystem path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageResource for FileResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn open_stream(&self) -> CompositorResult<Box<dyn Read + Send>> {
        let f = std::fs::File::open(&self.path).map_err(|e| {
            CompositorError::io(format!("open image '{}': {e}", self.path.display()))
        })?;
        Ok(Box::new(std::io::BufReader::new(f)))
    }

    fn modified_time(&self) -> u64 {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(UNKNOWN_MODIFIED)
    }
}

/// In-memory image with a caller-controlled modification time.
///
/// Useful for embedded assets and for simulating file changes.
#[derive(Debug)]
pub struct MemoryResource {
    id: String,
    bytes: Mutex<Arc<Vec<u8>>>,
    modified: AtomicU64,
}

impl MemoryResource {
    /// Create a resource named `name` holding `bytes`, stamped with `modified`.
    pub fn new(name: &str, bytes: Vec<u8>, modified: u64) -> Self {
        Self {
            id: format!("mem:{name}"),
            bytes: Mutex::new(Arc::new(bytes)),
            modified: AtomicU64::new(modified),
        }
    }

    /// Replace the payload and bump the modification time.
    pub fn replace(&self, bytes: Vec<u8>, modified: u64) {
        if let Ok(mut slot) = self.bytes.lock() {
            *slot = Arc::new(bytes);
        }
        self.modified.store(modified, AtomicOrdering::SeqCst);
    }

    /// Change only the modification time.
    pub fn touch(&self, modified: u64) {
        self.modified.store(modified, AtomicOrdering::SeqCst);
    }
}

impl ImageResource for MemoryResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn open_stream(&self) -> CompositorResult<Box<dyn Read + Send>> {
        let bytes = self
            .bytes
            .lock()
            .map_err(|_| CompositorError::runtime("memory resource lock poisoned"))?
            .clone();
        Ok(Box::new(Cursor::new(ArcBytes(bytes))))
    }

    fn modified_time(&self) -> u64 {
        self.modified.load(AtomicOrdering::SeqCst)
    }
}

struct ArcBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for ArcBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resource.rs"]
mod tests;
