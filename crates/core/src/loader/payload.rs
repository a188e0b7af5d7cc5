use std::{fmt, sync::Arc};

use image::DynamicImage;

/// Decoded form of a loaded resource.
///
/// Cloning is cheap: heavy variants share their data.
#[derive(Clone)]
pub enum Payload {
    /// Decoded raster image (8-bit or floating point for HDR sources).
    Image(Arc<DynamicImage>),
    /// Image wrapped for upload by a renderer.
    Texture(Texture),
    /// Imported glTF scene with its buffers and embedded images.
    Model(Arc<ModelData>),
    /// Raw file contents for formats that are handed to an external decoder.
    Bytes(Arc<[u8]>),
    /// The load action completed without usable data.
    Failed(String),
}

impl Payload {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Texture(_) => "texture",
            Self::Model(_) => "model",
            Self::Bytes(_) => "bytes",
            Self::Failed(_) => "failed",
        }
    }

    pub fn as_texture(&self) -> Option<&Texture> {
        match self {
            Self::Texture(texture) => Some(texture),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(image) => f
                .debug_struct("Image")
                .field("width", &image.width())
                .field("height", &image.height())
                .finish(),
            Self::Texture(texture) => texture.fmt(f),
            Self::Model(model) => model.fmt(f),
            Self::Bytes(bytes) => f.debug_struct("Bytes").field("len", &bytes.len()).finish(),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Renderable wrapper around a decoded image.
#[derive(Clone)]
pub struct Texture {
    image: Arc<DynamicImage>,
    /// Set whenever the pixel data must be (re)uploaded.
    pub needs_update: bool,
}

impl Texture {
    pub fn new(image: Arc<DynamicImage>) -> Self {
        Self {
            image,
            needs_update: true,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("needs_update", &self.needs_update)
            .finish()
    }
}

/// Result of importing a `.gltf`/`.glb` file.
pub struct ModelData {
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
    pub images: Vec<gltf::image::Data>,
}

impl fmt::Debug for ModelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelData")
            .field("meshes", &self.document.meshes().count())
            .field("buffers", &self.buffers.len())
            .field("images", &self.images.len())
            .finish()
    }
}
