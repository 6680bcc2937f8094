use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

use crate::completion::{Handle, LoadState};
use crate::error::ResourceError;
use crate::renderer::{SceneRenderer, TextureId};

// ── Image sources ────────────────────────────────────────────────────────────

/// Where decoded images come from. Implementations do no caching of their own.
pub trait ImageSource {
    fn load(&mut self, uri: &str) -> Result<RgbaImage, ResourceError>;
}

/// Reads image files relative to a root directory.
pub struct FileImageSource {
    root: PathBuf,
}

impl FileImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every `.png` under the root, as URIs relative to it, sorted.
    pub fn discover(&self) -> Vec<String> {
        let mut found: Vec<String> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("png"))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        found.sort();
        found
    }
}

impl ImageSource for FileImageSource {
    fn load(&mut self, uri: &str) -> Result<RgbaImage, ResourceError> {
        let path = self.root.join(uri);
        image::open(&path)
            .map(|img| img.to_rgba8())
            .map_err(|e| ResourceError::load_failure(uri, e.to_string()))
    }
}

/// In-memory images keyed by URI. Used by tests and the procedural demo.
#[derive(Default)]
pub struct MemoryImageSource {
    images: HashMap<String, RgbaImage>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uri: &str, image: RgbaImage) -> Self {
        self.insert(uri, image);
        self
    }

    pub fn insert(&mut self, uri: &str, image: RgbaImage) {
        self.images.insert(uri.to_string(), image);
    }
}

impl ImageSource for MemoryImageSource {
    fn load(&mut self, uri: &str) -> Result<RgbaImage, ResourceError> {
        self.images
            .get(uri)
            .cloned()
            .ok_or_else(|| ResourceError::load_failure(uri, "no such image"))
    }
}

// ── TextureCache ─────────────────────────────────────────────────────────────

pub type ImageHandle = Handle<Arc<RgbaImage>>;

/// Memoizing image and texture cache.
///
/// Each URI maps to exactly one [`Handle`]; a second request for the same URI
/// returns a clone of the first and never touches the source again. Loads
/// are queued and performed by [`TextureCache::pump`], at most
/// `loads_per_pump` per call, so the frame loop decides when I/O happens.
pub struct TextureCache {
    source: Box<dyn ImageSource>,
    images: HashMap<String, ImageHandle>,
    queue: VecDeque<String>,
    loads_per_pump: usize,
    uploads: HashMap<String, TextureId>,
    retired: Vec<TextureId>,
    source_loads: usize,
}

impl TextureCache {
    pub const DEFAULT_LOADS_PER_PUMP: usize = 4;

    pub fn new(source: Box<dyn ImageSource>) -> Self {
        Self {
            source,
            images: HashMap::new(),
            queue: VecDeque::new(),
            loads_per_pump: Self::DEFAULT_LOADS_PER_PUMP,
            uploads: HashMap::new(),
            retired: Vec::new(),
            source_loads: 0,
        }
    }

    pub fn with_loads_per_pump(mut self, n: usize) -> Self {
        self.loads_per_pump = n.max(1);
        self
    }

    /// Handle for `uri`, queueing a load on first request.
    pub fn request(&mut self, uri: &str) -> ImageHandle {
        if let Some(handle) = self.images.get(uri) {
            return handle.clone();
        }
        log::trace!("texture cache: queueing '{uri}'");
        let handle = Handle::pending();
        self.images.insert(uri.to_string(), handle.clone());
        self.queue.push_back(uri.to_string());
        handle
    }

    /// Register an already-decoded image under `uri` (e.g. a packed atlas).
    /// A previous upload for the same URI is retired.
    pub fn insert(&mut self, uri: &str, image: RgbaImage) -> ImageHandle {
        let image = Arc::new(image);
        if let Some(existing) = self.images.get(uri) {
            if existing.is_pending() {
                existing.resolve(Ok(image));
                return existing.clone();
            }
        }
        if let Some(old) = self.uploads.remove(uri) {
            self.retired.push(old);
        }
        self.queue.retain(|q| q != uri);
        let handle = Handle::ready(image);
        self.images.insert(uri.to_string(), handle.clone());
        handle
    }

    /// Perform up to `loads_per_pump` queued loads, in request order.
    /// Returns how many handles were settled.
    pub fn pump(&mut self) -> usize {
        let mut settled = 0;
        while settled < self.loads_per_pump {
            let Some(uri) = self.queue.pop_front() else { break };
            let Some(handle) = self.images.get(&uri).cloned() else { continue };
            if !handle.is_pending() {
                continue;
            }
            self.source_loads += 1;
            match self.source.load(&uri) {
                Ok(img) => {
                    log::debug!("texture cache: loaded '{uri}' ({}x{})", img.width(), img.height());
                    handle.resolve(Ok(Arc::new(img)));
                }
                Err(e) => {
                    log::error!("texture cache: {e}");
                    handle.resolve(Err(e));
                }
            }
            settled += 1;
        }
        settled
    }

    pub fn pending_loads(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self, uri: &str) -> Option<LoadState<Arc<RgbaImage>>> {
        self.images.get(uri).map(|h| h.state())
    }

    /// GPU texture for a loaded image, uploading it on first use.
    /// `None` while the image is still loading or after it failed.
    pub fn texture_id(&mut self, uri: &str, renderer: &mut dyn SceneRenderer) -> Option<TextureId> {
        for id in self.retired.drain(..) {
            renderer.release_texture(id);
        }
        if let Some(id) = self.uploads.get(uri) {
            return Some(*id);
        }
        let image = self.images.get(uri)?.get()?;
        let id = renderer.upload_texture(uri, &image);
        self.uploads.insert(uri.to_string(), id);
        Some(id)
    }

    /// Free every GPU texture this cache uploaded.
    pub fn release_all(&mut self, renderer: &mut dyn SceneRenderer) {
        for id in self.retired.drain(..) {
            renderer.release_texture(id);
        }
        for (_, id) in self.uploads.drain() {
            renderer.release_texture(id);
        }
    }

    /// Number of fetches that actually reached the image source.
    pub fn source_loads(&self) -> usize {
        self.source_loads
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(Box::new(MemoryImageSource::new()))
    }
}
