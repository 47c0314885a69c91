//! Pooled ownership of decoded images and their rasterized views.
//!
//! The [`ImagePool`] is the canonical store for finished [`Image`]s and
//! the [`RasterizedImage`] views handed to the renderer. Entries live
//! behind `Arc`, so their addresses stay valid while other entries are
//! inserted or removed.
//!
//! Lifetime management is handle-driven: [`create`](ImagePool::create)
//! and [`rasterize`](ImagePool::rasterize) return cloneable owning
//! handles, and when the last clone of a handle drops, a discard request
//! is queued on an internal channel. Handles may be dropped on any
//! thread; pool storage is only ever mutated by the owning thread inside
//! [`drain_discards`](ImagePool::drain_discards), typically called once
//! per render pass.

use std::collections::HashMap;
use std::sync::{mpsc, Arc};

use crate::error::GraphicsError;
use crate::image::{Image, RasterizedImage};
use crate::types::{
    CellCoord, CellSpan, ImageAlignment, ImageId, ImageResize, PixelFormat, PixelSize,
    RasterizedImageId, RgbaColor,
};

/// Callback invoked when an image leaves the pool, before its entry is
/// erased. Renderers use this to evict cached textures.
pub type OnImageRemove = Box<dyn FnMut(&Image)>;

/// Discard requests queued by dropped handles.
#[derive(Debug)]
enum Discard {
    Image(ImageId),
    Rasterized(RasterizedImageId),
}

/// Shared core of [`ImageHandle`]; its drop queues the discard request
/// exactly once, when the last handle clone goes away.
struct ImageHandleCore {
    image: Arc<Image>,
    discards: mpsc::Sender<Discard>,
}

impl Drop for ImageHandleCore {
    fn drop(&mut self) {
        // The pool (and its receiver) may already be gone during teardown.
        let _ = self.discards.send(Discard::Image(self.image.id()));
    }
}

/// Owning, cloneable reference to a pooled [`Image`].
///
/// Dropping the last clone queues the image for reclamation; the entry is
/// actually removed on the pool's next
/// [`drain_discards`](ImagePool::drain_discards) pass.
#[derive(Clone)]
pub struct ImageHandle {
    core: Arc<ImageHandleCore>,
}

impl ImageHandle {
    pub fn image(&self) -> &Image {
        &self.core.image
    }

    pub fn id(&self) -> ImageId {
        self.core.image.id()
    }

    fn share_image(&self) -> Arc<Image> {
        Arc::clone(&self.core.image)
    }
}

impl std::ops::Deref for ImageHandle {
    type Target = Image;

    fn deref(&self) -> &Image {
        &self.core.image
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle").field("id", &self.id()).finish()
    }
}

/// Shared core of [`RasterizedHandle`]; see [`ImageHandleCore`].
struct RasterizedHandleCore {
    raster: Arc<RasterizedImage>,
    discards: mpsc::Sender<Discard>,
}

impl Drop for RasterizedHandleCore {
    fn drop(&mut self) {
        let _ = self.discards.send(Discard::Rasterized(self.raster.id()));
    }
}

/// Owning, cloneable reference to a pooled [`RasterizedImage`].
///
/// Dropping the last clone queues the view for reclamation without
/// affecting the underlying image or its other views.
#[derive(Clone)]
pub struct RasterizedHandle {
    core: Arc<RasterizedHandleCore>,
}

impl RasterizedHandle {
    pub fn rasterized(&self) -> &RasterizedImage {
        &self.core.raster
    }

    pub fn id(&self) -> RasterizedImageId {
        self.core.raster.id()
    }

    /// Convenience forward to [`RasterizedImage::fragment`].
    pub fn fragment(&self, pos: CellCoord) -> Vec<u8> {
        self.core.raster.fragment(pos)
    }
}

impl std::ops::Deref for RasterizedHandle {
    type Target = RasterizedImage;

    fn deref(&self) -> &RasterizedImage {
        &self.core.raster
    }
}

impl std::fmt::Debug for RasterizedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterizedHandle")
            .field("id", &self.id())
            .finish()
    }
}

/// Canonical store for images, rasterized views, and name aliases.
pub struct ImagePool {
    images: HashMap<ImageId, Arc<Image>>,
    rasterized: HashMap<RasterizedImageId, Arc<RasterizedImage>>,
    /// Alias table. Holds handle clones of its own, so a linked name
    /// keeps its image alive independently of external handles.
    named: HashMap<String, ImageHandle>,
    next_image_id: u32,
    next_rasterized_id: u32,
    discard_tx: mpsc::Sender<Discard>,
    discard_rx: mpsc::Receiver<Discard>,
    on_image_remove: Option<OnImageRemove>,
}

impl ImagePool {
    pub fn new() -> Self {
        let (discard_tx, discard_rx) = mpsc::channel();
        Self {
            images: HashMap::new(),
            rasterized: HashMap::new(),
            named: HashMap::new(),
            next_image_id: 1,
            next_rasterized_id: 1,
            discard_tx,
            discard_rx,
            on_image_remove: None,
        }
    }

    /// Registers the image-removal observer.
    pub fn on_image_remove(&mut self, callback: impl FnMut(&Image) + 'static) {
        self.on_image_remove = Some(Box::new(callback));
    }

    /// Stores a finished pixel buffer as a new [`Image`] with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::DataSizeMismatch`] when `data` does not
    /// match `size` times the format's bytes per pixel.
    pub fn create(
        &mut self,
        format: PixelFormat,
        size: PixelSize,
        data: Vec<u8>,
    ) -> Result<ImageHandle, GraphicsError> {
        let expected = size.area() * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(GraphicsError::DataSizeMismatch {
                width: size.width,
                height: size.height,
                format,
                expected,
                actual: data.len(),
            });
        }

        let id = ImageId(self.next_image_id);
        self.next_image_id = self.next_image_id.wrapping_add(1);
        if self.next_image_id == 0 {
            self.next_image_id = 1; // Skip 0
        }

        let image = Arc::new(Image::new(id, format, data, size));
        self.images.insert(id, Arc::clone(&image));
        log::debug!("pooled image {id:?} ({}x{})", size.width, size.height);

        Ok(ImageHandle {
            core: Arc::new(ImageHandleCore {
                image,
                discards: self.discard_tx.clone(),
            }),
        })
    }

    /// Creates a [`RasterizedImage`] view of `image` bound to the given
    /// placement policy.
    pub fn rasterize(
        &mut self,
        image: &ImageHandle,
        alignment: ImageAlignment,
        resize: ImageResize,
        default_color: RgbaColor,
        cell_span: CellSpan,
        cell_size: PixelSize,
    ) -> RasterizedHandle {
        let id = RasterizedImageId(self.next_rasterized_id);
        self.next_rasterized_id = self.next_rasterized_id.wrapping_add(1);
        if self.next_rasterized_id == 0 {
            self.next_rasterized_id = 1;
        }

        let raster = Arc::new(RasterizedImage::new(
            id,
            image.share_image(),
            alignment,
            resize,
            default_color,
            cell_span,
            cell_size,
        ));
        self.rasterized.insert(id, Arc::clone(&raster));

        RasterizedHandle {
            core: Arc::new(RasterizedHandleCore {
                raster,
                discards: self.discard_tx.clone(),
            }),
        }
    }

    /// Associates `name` with the image. The pool keeps its own handle
    /// clone, so the alias outlives every external handle until
    /// [`unlink`](Self::unlink)ed.
    pub fn link(&mut self, name: impl Into<String>, image: &ImageHandle) {
        self.named.insert(name.into(), image.clone());
    }

    /// Removes the alias. If that was the image's last reference, it is
    /// queued for reclamation.
    pub fn unlink(&mut self, name: &str) {
        self.named.remove(name);
    }

    pub fn find_by_name(&self, name: &str) -> Option<ImageHandle> {
        self.named.get(name).cloned()
    }

    /// Drains queued discard requests and reclaims the matching entries.
    ///
    /// This is the single point where pool storage is mutated for
    /// reclamation; it must run on the pool's owning thread, typically
    /// once per render pass.
    pub fn drain_discards(&mut self) {
        while let Ok(request) = self.discard_rx.try_recv() {
            match request {
                Discard::Image(id) => self.remove_image(id),
                Discard::Rasterized(id) => {
                    self.rasterized.remove(&id);
                }
            }
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn rasterized_count(&self) -> usize {
        self.rasterized.len()
    }

    fn remove_image(&mut self, id: ImageId) {
        if let Some(image) = self.images.remove(&id) {
            log::debug!("reclaiming image {id:?} ({} bytes)", image.data().len());
            if let Some(callback) = self.on_image_remove.as_mut() {
                callback(&image);
            }
        }
    }
}

impl Default for ImagePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rgba(pool: &mut ImagePool, width: u32, height: u32) -> ImageHandle {
        let size = PixelSize::new(width, height);
        pool.create(PixelFormat::Rgba, size, vec![0u8; size.area() * 4])
            .unwrap()
    }

    fn rasterize(pool: &mut ImagePool, image: &ImageHandle) -> RasterizedHandle {
        pool.rasterize(
            image,
            ImageAlignment::default(),
            ImageResize::default(),
            RgbaColor::TRANSPARENT,
            CellSpan::new(1, 1),
            PixelSize::new(2, 2),
        )
    }

    #[test]
    fn test_create_assigns_monotonic_ids() {
        let mut pool = ImagePool::new();
        let a = rgba(&mut pool, 1, 1);
        let b = rgba(&mut pool, 1, 1);
        assert_eq!(a.id(), ImageId(1));
        assert_eq!(b.id(), ImageId(2));
        assert_eq!(pool.image_count(), 2);
    }

    #[test]
    fn test_create_rejects_size_mismatch() {
        let mut pool = ImagePool::new();
        let result = pool.create(PixelFormat::Rgba, PixelSize::new(2, 2), vec![0u8; 3]);
        assert!(matches!(
            result,
            Err(GraphicsError::DataSizeMismatch { expected: 16, actual: 3, .. })
        ));
    }

    #[test]
    fn test_drop_then_drain_reclaims_entry() {
        let mut pool = ImagePool::new();
        let handle = rgba(&mut pool, 1, 1);
        drop(handle);

        // Nothing is mutated until the pool drains.
        assert_eq!(pool.image_count(), 1);
        pool.drain_discards();
        assert_eq!(pool.image_count(), 0);
    }

    #[test]
    fn test_clones_keep_entry_alive() {
        let mut pool = ImagePool::new();
        let handle = rgba(&mut pool, 1, 1);
        let clone = handle.clone();

        drop(handle);
        pool.drain_discards();
        assert_eq!(pool.image_count(), 1);

        drop(clone);
        pool.drain_discards();
        assert_eq!(pool.image_count(), 0);
    }

    #[test]
    fn test_removal_observer_runs_before_erase() {
        let removed: Rc<RefCell<Vec<ImageId>>> = Rc::default();
        let seen = Rc::clone(&removed);

        let mut pool = ImagePool::new();
        pool.on_image_remove(move |image| seen.borrow_mut().push(image.id()));

        let handle = rgba(&mut pool, 1, 1);
        let id = handle.id();
        drop(handle);
        pool.drain_discards();

        assert_eq!(*removed.borrow(), vec![id]);
    }

    #[test]
    fn test_sibling_entries_stay_stable_across_removal() {
        let mut pool = ImagePool::new();
        let first = rgba(&mut pool, 1, 1);
        let second = rgba(&mut pool, 1, 1);
        let address = second.image() as *const Image;

        drop(first);
        pool.drain_discards();

        assert_eq!(second.image() as *const Image, address);
        assert_eq!(second.image().data(), &[0u8; 4][..]);
    }

    #[test]
    fn test_rasterized_drop_leaves_image_untouched() {
        let mut pool = ImagePool::new();
        let image = rgba(&mut pool, 4, 4);
        let view = rasterize(&mut pool, &image);
        let sibling = rasterize(&mut pool, &image);
        assert_eq!(pool.rasterized_count(), 2);

        drop(view);
        pool.drain_discards();
        assert_eq!(pool.rasterized_count(), 1);
        assert_eq!(pool.image_count(), 1);

        // The surviving view still extracts fragments.
        assert_eq!(sibling.fragment(CellCoord::new(0, 0)).len(), 2 * 2 * 4);
    }

    #[test]
    fn test_view_outlives_reclaimed_image() {
        let mut pool = ImagePool::new();
        let image = rgba(&mut pool, 4, 4);
        let view = rasterize(&mut pool, &image);

        drop(image);
        pool.drain_discards();
        assert_eq!(pool.image_count(), 0);

        // The view co-owns the image data.
        assert_eq!(view.image().size(), PixelSize::new(4, 4));
        assert_eq!(view.fragment(CellCoord::new(0, 0)).len(), 2 * 2 * 4);
    }

    #[test]
    fn test_alias_keeps_image_alive() {
        let mut pool = ImagePool::new();
        let handle = rgba(&mut pool, 1, 1);
        let id = handle.id();
        pool.link("logo", &handle);

        drop(handle);
        pool.drain_discards();

        assert_eq!(pool.image_count(), 1);
        let found = pool.find_by_name("logo").unwrap();
        assert_eq!(found.id(), id);
    }

    #[test]
    fn test_unlink_releases_last_reference() {
        let mut pool = ImagePool::new();
        let handle = rgba(&mut pool, 1, 1);
        pool.link("logo", &handle);
        drop(handle);

        pool.unlink("logo");
        pool.drain_discards();

        assert_eq!(pool.image_count(), 0);
        assert!(pool.find_by_name("logo").is_none());
    }

    #[test]
    fn test_find_by_name_unknown() {
        let pool = ImagePool::new();
        assert!(pool.find_by_name("nope").is_none());
    }

    #[test]
    fn test_handles_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ImageHandle>();
        assert_send::<RasterizedHandle>();
    }

    #[test]
    fn test_foreign_thread_drop_drains_on_owner_thread() {
        let mut pool = ImagePool::new();
        let handle = rgba(&mut pool, 1, 1);

        std::thread::spawn(move || drop(handle))
            .join()
            .unwrap();

        pool.drain_discards();
        assert_eq!(pool.image_count(), 0);
    }
}
