//! Disk-backed load actions used by the application.
//!
//! Each action resolves the resource source against a base directory and
//! decodes on a dedicated worker thread, so `load` never blocks. Decode and
//! I/O failures complete the resource with [`Payload::Failed`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use super::{Completion, ExtensionHandler, ModelData, Payload};
use crate::Result;

/// The standard registration table, in priority order.
pub fn default_handlers(base_dir: impl Into<PathBuf>) -> Vec<ExtensionHandler> {
    let base_dir = base_dir.into();
    vec![
        decoding_handler(&base_dir, &["jpg", "png"], decode_image),
        decoding_handler(&base_dir, &["basis"], read_bytes),
        decoding_handler(&base_dir, &["drc"], read_bytes),
        decoding_handler(&base_dir, &["glb", "gltf"], import_gltf),
        decoding_handler(&base_dir, &["fbx"], read_bytes),
        decoding_handler(&base_dir, &["hdr"], decode_image),
    ]
}

fn decoding_handler(
    base_dir: &Path,
    extensions: &[&str],
    decode: fn(&Path) -> Result<Payload>,
) -> ExtensionHandler {
    let base_dir = base_dir.to_path_buf();
    ExtensionHandler::new(extensions.to_vec(), move |completion: Completion| {
        let path = base_dir.join(&completion.resource().source);
        spawn_decode(completion, path, decode);
    })
}

fn spawn_decode(completion: Completion, path: PathBuf, decode: fn(&Path) -> Result<Payload>) {
    let name = format!("load-{}", completion.resource().name);
    let spawned = thread::Builder::new().name(name).spawn(move || {
        let payload = decode(&path).unwrap_or_else(|err| {
            tracing::debug!(path = %path.display(), %err, "decode failed");
            Payload::Failed(err.to_string())
        });
        completion.complete(payload);
    });

    // On spawn failure the closure, and the completion with it, is dropped,
    // which completes the resource as failed.
    if let Err(err) = spawned {
        tracing::error!(%err, "could not spawn load worker");
    }
}

fn decode_image(path: &Path) -> Result<Payload> {
    let image = image::open(path)?;
    Ok(Payload::Image(Arc::new(image)))
}

fn read_bytes(path: &Path) -> Result<Payload> {
    let bytes = std::fs::read(path)?;
    Ok(Payload::Bytes(bytes.into()))
}

fn import_gltf(path: &Path) -> Result<Payload> {
    let (document, buffers, images) = gltf::import(path)?;
    Ok(Payload::Model(Arc::new(ModelData {
        document,
        buffers,
        images,
    })))
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use super::*;
    use crate::loader::{Loader, LoaderEvent, Resource};

    fn load_all(loader: &Loader, resources: &[Resource]) -> bool {
        let finished = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&finished);
        loader.events().on("end.test", move |_: &LoaderEvent| *flag.borrow_mut() = true);

        loader.load(resources);
        for _ in 0..200 {
            if *finished.borrow() {
                break;
            }
            loader.pump_timeout(Duration::from_millis(25));
        }
        loader.events().off("test.");

        let done = *finished.borrow();
        done
    }

    #[test]
    fn registers_handlers_in_priority_order() {
        let handlers = default_handlers(".");
        let extensions: Vec<Vec<String>> = handlers
            .iter()
            .map(|handler| handler.extensions().to_vec())
            .collect();

        assert_eq!(extensions[0], vec!["jpg", "png"]);
        assert_eq!(extensions[3], vec!["glb", "gltf"]);
        assert_eq!(extensions[5], vec!["hdr"]);
    }

    #[test]
    fn decodes_png_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(4, 2)
            .save(dir.path().join("tile.png"))
            .unwrap();
        let loader = Loader::new(default_handlers(dir.path()));

        assert!(load_all(&loader, &[Resource::new("tile", "tile.png", "texture")]));

        match loader.item("tile") {
            Some(Payload::Image(image)) => {
                assert_eq!(image.width(), 4);
                assert_eq!(image.height(), 2);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn missing_file_completes_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Loader::new(default_handlers(dir.path()));

        assert!(load_all(&loader, &[Resource::new("ghost", "ghost.png", "texture")]));
        assert!(loader.item("ghost").is_some_and(|payload| payload.is_failed()));
    }

    #[test]
    fn passes_through_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mesh.drc"), [1_u8, 2, 3]).unwrap();
        let loader = Loader::new(default_handlers(dir.path()));

        assert!(load_all(&loader, &[Resource::new("mesh", "mesh.drc", "model")]));
        assert!(matches!(loader.item("mesh"), Some(Payload::Bytes(bytes)) if bytes.to_vec() == vec![1, 2, 3]));
    }

    #[test]
    fn invalid_gltf_completes_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.glb"), b"not a model").unwrap();
        let loader = Loader::new(default_handlers(dir.path()));

        assert!(load_all(&loader, &[Resource::new("broken", "broken.glb", "model")]));
        assert!(loader.item("broken").is_some_and(|payload| payload.is_failed()));
    }
}
