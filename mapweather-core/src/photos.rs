//! Photo picking and concurrent loading of the picked items.
//!
//! The picker UI itself belongs to the platform. This module describes what
//! to ask it for ([`PickerRequest`]) and loads whatever it returns: every
//! item is loaded concurrently and [`load_all`] resolves only once each load
//! has finished, successfully or not. Failed items are left out.
//!
//! Loading means decoding: an item only counts once its pixels have been
//! decoded, a recognised header alone is not enough.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::{config::PickerConfig, error::ImageLoadError};

/// Kinds of media the picker may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFilter {
    Images,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerRequest {
    /// 0 means no limit.
    pub selection_limit: usize,
    pub filter: MediaFilter,
}

impl Default for PickerRequest {
    fn default() -> Self {
        Self::from(PickerConfig::default())
    }
}

impl From<PickerConfig> for PickerRequest {
    fn from(config: PickerConfig) -> Self {
        Self { selection_limit: config.selection_limit, filter: MediaFilter::Images }
    }
}

impl PickerRequest {
    /// Drop anything past the selection limit.
    pub fn clamp<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.selection_limit > 0 && items.len() > self.selection_limit {
            debug!(
                picked = items.len(),
                limit = self.selection_limit,
                "ignoring items past the selection limit"
            );
            items.truncate(self.selection_limit);
        }
        items
    }
}

/// Opaque reference to one item returned by the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickedItem {
    File(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl PickedItem {
    pub fn name(&self) -> String {
        match self {
            PickedItem::File(path) => path.display().to_string(),
            PickedItem::Bytes { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
    Heic,
}

impl ImageFormat {
    /// Recognise an image by its leading signature bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageFormat::WebP),
            [b'B', b'M', ..] => Some(ImageFormat::Bmp),
            [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..]
                if brand.starts_with(b"heic")
                    || brand.starts_with(b"heix")
                    || brand.starts_with(b"mif1")
                    || brand.starts_with(b"msf1") =>
            {
                Some(ImageFormat::Heic)
            }
            _ => None,
        }
    }

    /// Codec used to decode this format, if one is built in.
    fn codec(self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Gif => Some(image::ImageFormat::Gif),
            ImageFormat::WebP => Some(image::ImageFormat::WebP),
            ImageFormat::Bmp => Some(image::ImageFormat::Bmp),
            ImageFormat::Heic => None,
        }
    }
}

/// A picked item decoded into RGBA pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub name: String,
    pub format: ImageFormat,
    pub pixels: image::RgbaImage,
}

impl LoadedImage {
    /// Decode `data` fully. Fails for unknown signatures, formats without a
    /// built-in codec and truncated or corrupt bodies.
    pub fn decode(name: String, data: &[u8]) -> Result<Self, ImageLoadError> {
        let Some(format) = ImageFormat::sniff(data) else {
            return Err(ImageLoadError::UnsupportedFormat(name));
        };
        let Some(codec) = format.codec() else {
            debug!(%name, ?format, "no decoder for format");
            return Err(ImageLoadError::UnsupportedFormat(name));
        };

        match image::load_from_memory_with_format(data, codec) {
            Ok(decoded) => Ok(Self { name, format, pixels: decoded.to_rgba8() }),
            Err(source) => Err(ImageLoadError::Decode { name, source }),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Loads one picked item.
#[async_trait]
pub trait ItemLoader: Send + Sync {
    async fn load(&self, item: &PickedItem) -> Result<LoadedImage, ImageLoadError>;
}

/// Presents the system picker.
#[async_trait]
pub trait PhotoPicker: Send + Sync {
    async fn pick(&self, request: PickerRequest) -> Vec<PickedItem>;
}

/// Load every item concurrently and wait for all of them.
///
/// Successful images keep the pick order; failures are logged and omitted.
pub async fn load_all<L>(items: &[PickedItem], loader: &L) -> Vec<LoadedImage>
where
    L: ItemLoader + ?Sized,
{
    let results = join_all(items.iter().map(|item| loader.load(item))).await;

    let total = results.len();
    let images: Vec<LoadedImage> = results
        .into_iter()
        .zip(items)
        .filter_map(|(result, item)| match result {
            Ok(image) => Some(image),
            Err(error) => {
                warn!(item = %item.name(), %error, "dropping picked item");
                None
            }
        })
        .collect();

    debug!(loaded = images.len(), total, "picked items loaded");
    images
}

/// Ask the picker for items and load them.
pub async fn pick_and_load<P, L>(picker: &P, loader: &L, request: PickerRequest) -> Vec<LoadedImage>
where
    P: PhotoPicker + ?Sized,
    L: ItemLoader + ?Sized,
{
    let items = request.clamp(picker.pick(request).await);
    load_all(&items, loader).await
}

/// Reads file items from disk and decodes every item on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileItemLoader;

impl FileItemLoader {
    async fn read(path: &Path) -> Result<Vec<u8>, ImageLoadError> {
        tokio::fs::read(path)
            .await
            .map_err(|source| ImageLoadError::Io { path: path.to_path_buf(), source })
    }

    async fn decode(name: String, data: Vec<u8>) -> Result<LoadedImage, ImageLoadError> {
        let label = name.clone();
        tokio::task::spawn_blocking(move || LoadedImage::decode(name, &data))
            .await
            .map_err(|_| ImageLoadError::Interrupted(label))?
    }
}

#[async_trait]
impl ItemLoader for FileItemLoader {
    async fn load(&self, item: &PickedItem) -> Result<LoadedImage, ImageLoadError> {
        let data = match item {
            PickedItem::File(path) => Self::read(path).await?,
            PickedItem::Bytes { data, .. } => data.clone(),
        };
        Self::decode(item.name(), data).await
    }
}
