//! Extension-keyed resource loading.
//!
//! A [`Loader`] routes each [`Resource`] to the first registered
//! [`ExtensionHandler`] whose extension list contains the resource's file
//! extension. The handler receives a one-shot [`Completion`] and may finish it
//! synchronously or from any thread; finished resources are applied on the
//! control thread by [`Loader::pump`] and announced as `fileEnd`, followed by
//! `end` once the batch join is satisfied.

pub mod handlers;
mod payload;

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::events::EventEmitter;

pub use payload::{ModelData, Payload, Texture};

/// Resource type tag for images that should become textures.
pub const TEXTURE_TYPE: &str = "texture";

/// Input unit of the loader. `name` identifies it in the items map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form configuration fields the loader ignores.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Resource {
    pub fn new(name: impl Into<String>, source: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            kind: kind.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Lowercase trailing extension of `source`, if it has one.
    pub fn extension(&self) -> Option<&str> {
        let (_, extension) = self.source.rsplit_once('.')?;
        (!extension.is_empty() && extension.bytes().all(|b| b.is_ascii_lowercase()))
            .then_some(extension)
    }
}

/// Events emitted by a [`Loader`].
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    FileEnd { resource: Resource, data: Payload },
    End,
}

impl LoaderEvent {
    pub const FILE_END: &'static str = "fileEnd";
    pub const END: &'static str = "end";
}

/// How the loader decides that a batch is complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// `end` fires when the completed count equals the submitted count.
    /// Unroutable resources stall the batch and duplicate completions can
    /// fire `end` early.
    #[default]
    Counter,
    /// `end` fires when every routed resource has completed once.
    /// Duplicates are ignored and unroutable resources are not waited for.
    Tracked,
}

struct Finished {
    resource: Resource,
    payload: Payload,
}

/// One-shot token handed to a load action.
///
/// Completing consumes the token. A token dropped without completing (for
/// example when a worker thread panics) completes with [`Payload::Failed`].
pub struct Completion {
    resource: Resource,
    sender: Sender<Finished>,
    done: bool,
}

impl Completion {
    fn new(resource: Resource, sender: Sender<Finished>) -> Self {
        Self {
            resource,
            sender,
            done: false,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn complete(mut self, payload: Payload) {
        self.finish(payload);
    }

    fn finish(&mut self, payload: Payload) {
        self.done = true;
        let finished = Finished {
            resource: std::mem::take(&mut self.resource),
            payload,
        };
        if let Err(err) = self.sender.send(finished) {
            tracing::debug!(
                resource = %err.0.resource.name,
                "loader is gone, discarding completion"
            );
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!(
                resource = %self.resource.name,
                "load action dropped its completion"
            );
            self.finish(Payload::Failed("load action dropped its completion".into()));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resource", &self.resource.name)
            .field("done", &self.done)
            .finish()
    }
}

/// Load action invoked on the control thread for each routed resource.
pub type LoadAction = Box<dyn Fn(Completion)>;

/// Registration entry: a set of extensions and the action that loads them.
pub struct ExtensionHandler {
    extensions: Vec<String>,
    action: LoadAction,
}

impl ExtensionHandler {
    pub fn new<I, S, F>(extensions: I, action: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Completion) + 'static,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            action: Box::new(action),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn handles(&self, extension: &str) -> bool {
        self.extensions.iter().any(|candidate| candidate == extension)
    }
}

impl fmt::Debug for ExtensionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHandler")
            .field("extensions", &self.extensions)
            .finish()
    }
}

#[derive(Default)]
struct Progress {
    to_load: usize,
    loaded: usize,
    items: HashMap<String, Payload>,
    pending: HashSet<String>,
}

/// Resets the draining flag even if a callback unwinds.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Routes resources to extension handlers and joins their completions.
pub struct Loader {
    events: EventEmitter<LoaderEvent>,
    handlers: Vec<ExtensionHandler>,
    join: JoinPolicy,
    progress: RefCell<Progress>,
    sender: Sender<Finished>,
    receiver: Receiver<Finished>,
    draining: Cell<bool>,
}

impl Loader {
    /// Creates a loader with the counter join. Handler order is priority order.
    pub fn new(handlers: Vec<ExtensionHandler>) -> Self {
        Self::with_join_policy(handlers, JoinPolicy::Counter)
    }

    pub fn with_join_policy(handlers: Vec<ExtensionHandler>, join: JoinPolicy) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            events: EventEmitter::new(),
            handlers,
            join,
            progress: RefCell::new(Progress::default()),
            sender,
            receiver,
            draining: Cell::new(false),
        }
    }

    pub fn events(&self) -> &EventEmitter<LoaderEvent> {
        &self.events
    }

    pub fn join_policy(&self) -> JoinPolicy {
        self.join
    }

    pub fn handlers(&self) -> &[ExtensionHandler] {
        &self.handlers
    }

    /// Number of resources submitted over the loader's lifetime.
    pub fn to_load(&self) -> usize {
        self.progress.borrow().to_load
    }

    /// Number of completions applied over the loader's lifetime.
    pub fn loaded(&self) -> usize {
        self.progress.borrow().loaded
    }

    pub fn item(&self, name: &str) -> Option<Payload> {
        self.progress.borrow().items.get(name).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.progress.borrow().items.len()
    }

    /// Submits a batch of resources.
    ///
    /// Resources without a parseable extension or without a matching handler
    /// are logged and dropped. Completions that handlers delivered
    /// synchronously are applied before this returns, unless the call is
    /// nested inside a running drain, which then picks them up.
    pub fn load(&self, resources: &[Resource]) {
        let mut routed = 0;

        for resource in resources {
            self.progress.borrow_mut().to_load += 1;

            let Some(extension) = resource.extension() else {
                tracing::warn!(
                    resource = %resource.name,
                    source = %resource.source,
                    "cannot find extension of resource"
                );
                continue;
            };

            let Some(handler) = self.handlers.iter().find(|h| h.handles(extension)) else {
                tracing::warn!(
                    resource = %resource.name,
                    extension,
                    "cannot find loader for resource"
                );
                continue;
            };

            if self.join == JoinPolicy::Tracked
                && !self
                    .progress
                    .borrow_mut()
                    .pending
                    .insert(resource.name.clone())
            {
                tracing::warn!(resource = %resource.name, "resource is already pending");
            }

            routed += 1;
            tracing::debug!(resource = %resource.name, extension, "dispatching resource");
            (handler.action)(Completion::new(resource.clone(), self.sender.clone()));
        }

        self.pump();

        if self.join == JoinPolicy::Tracked
            && routed == 0
            && !resources.is_empty()
            && self.progress.borrow().pending.is_empty()
        {
            self.events.trigger(LoaderEvent::END, &LoaderEvent::End);
        }
    }

    /// Applies every completion that has already arrived. Returns how many
    /// were applied; nested calls during a drain return 0.
    pub fn pump(&self) -> usize {
        self.drain(None)
    }

    /// Waits up to `timeout` for a completion, then drains like [`pump`].
    ///
    /// [`pump`]: Loader::pump
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        if self.draining.get() {
            return 0;
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(first) => self.drain(Some(first)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn drain(&self, first: Option<Finished>) -> usize {
        if self.draining.replace(true) {
            return 0;
        }
        let _guard = DrainGuard(&self.draining);

        let mut applied = 0;
        let mut next = first.or_else(|| self.receiver.try_recv().ok());
        while let Some(finished) = next {
            self.file_load_end(finished.resource, finished.payload);
            applied += 1;
            next = self.receiver.try_recv().ok();
        }
        applied
    }

    /// Records a finished resource and emits `fileEnd`, then `end` when the
    /// batch join is satisfied.
    pub fn file_load_end(&self, resource: Resource, data: Payload) {
        {
            let mut progress = self.progress.borrow_mut();
            if self.join == JoinPolicy::Tracked && !progress.pending.remove(&resource.name) {
                tracing::warn!(
                    resource = %resource.name,
                    "ignoring completion for a resource that is not pending"
                );
                return;
            }
            progress.loaded += 1;
            progress.items.insert(resource.name.clone(), data.clone());
        }

        if let Payload::Failed(reason) = &data {
            tracing::warn!(resource = %resource.name, %reason, "resource failed to load");
        } else {
            tracing::debug!(resource = %resource.name, kind = data.kind(), "resource loaded");
        }

        self.events
            .trigger(LoaderEvent::FILE_END, &LoaderEvent::FileEnd { resource, data });

        let batch_done = {
            let progress = self.progress.borrow();
            match self.join {
                JoinPolicy::Counter => progress.loaded == progress.to_load,
                JoinPolicy::Tracked => progress.pending.is_empty(),
            }
        };
        if batch_done {
            self.events.trigger(LoaderEvent::END, &LoaderEvent::End);
        }
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = self.progress.borrow();
        f.debug_struct("Loader")
            .field("handlers", &self.handlers)
            .field("join", &self.join)
            .field("to_load", &progress.to_load)
            .field("loaded", &progress.loaded)
            .field("items", &progress.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    type Parked = Rc<RefCell<Vec<Completion>>>;

    fn parking_handler(extensions: &[&str], parked: &Parked) -> ExtensionHandler {
        let parked = Rc::clone(parked);
        ExtensionHandler::new(extensions.to_vec(), move |completion| {
            parked.borrow_mut().push(completion)
        })
    }

    fn immediate_handler(extensions: &[&str]) -> ExtensionHandler {
        ExtensionHandler::new(extensions.to_vec(), |completion: Completion| {
            let payload = Payload::Bytes(completion.resource().name.as_bytes().into());
            completion.complete(payload);
        })
    }

    fn record_events(loader: &Loader) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        loader.events().on("fileEnd end", move |event: &LoaderEvent| {
            let entry = match event {
                LoaderEvent::FileEnd { resource, .. } => format!("fileEnd:{}", resource.name),
                LoaderEvent::End => "end".to_string(),
            };
            sink.borrow_mut().push(entry);
        });
        log
    }

    #[test]
    fn extracts_lowercase_trailing_extension() {
        assert_eq!(Resource::new("a", "textures/x.png", "texture").extension(), Some("png"));
        assert_eq!(Resource::new("a", "archive.tar.gz", "").extension(), Some("gz"));
        assert_eq!(Resource::new("a", "X.PNG", "").extension(), None);
        assert_eq!(Resource::new("a", "noext", "").extension(), None);
        assert_eq!(Resource::new("a", "dir.d/file", "").extension(), None);
        assert_eq!(Resource::new("a", "trailing.", "").extension(), None);
    }

    #[test]
    fn one_file_end_per_resource_and_one_end_in_any_order() {
        let parked = Parked::default();
        let loader = Loader::new(vec![
            parking_handler(&["jpg", "png"], &parked),
            parking_handler(&["glb"], &parked),
        ]);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "x.png", "texture"),
            Resource::new("b", "y.glb", "model"),
        ]);
        assert!(log.borrow().is_empty());

        let mut completions = parked.borrow_mut().drain(..).collect::<Vec<_>>();
        let second = completions.pop().unwrap();
        let first = completions.pop().unwrap();
        second.complete(Payload::Bytes(b"glb".to_vec().into()));
        assert_eq!(loader.pump(), 1);
        first.complete(Payload::Bytes(Vec::new().into()));
        assert_eq!(loader.pump(), 1);

        assert_eq!(*log.borrow(), vec!["fileEnd:b", "fileEnd:a", "end"]);
        assert_eq!(loader.to_load(), 2);
        assert_eq!(loader.loaded(), 2);
        assert!(loader.item("a").is_some());
    }

    #[test]
    fn unroutable_resource_stalls_the_batch() {
        let loader = Loader::new(vec![immediate_handler(&["png"])]);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "x.png", "texture"),
            Resource::new("b", "x.xyz", "model"),
        ]);

        assert_eq!(loader.pump_timeout(Duration::from_millis(50)), 0);
        assert_eq!(loader.to_load(), 2);
        assert_eq!(loader.loaded(), 1);
        assert_eq!(*log.borrow(), vec!["fileEnd:a"]);
    }

    #[test]
    fn source_without_extension_is_dropped() {
        let loader = Loader::new(vec![immediate_handler(&["png"])]);
        let log = record_events(&loader);

        loader.load(&[Resource::new("a", "no-extension", "texture")]);

        assert_eq!(loader.to_load(), 1);
        assert_eq!(loader.loaded(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn first_registered_handler_wins() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&hits);
        let second = Rc::clone(&hits);
        let loader = Loader::new(vec![
            ExtensionHandler::new(["png"], move |completion: Completion| {
                first.borrow_mut().push("first");
                completion.complete(Payload::Bytes(Vec::new().into()));
            }),
            ExtensionHandler::new(["png", "jpg"], move |completion: Completion| {
                second.borrow_mut().push("second");
                completion.complete(Payload::Bytes(Vec::new().into()));
            }),
        ]);

        loader.load(&[
            Resource::new("a", "a.png", "texture"),
            Resource::new("b", "b.jpg", "texture"),
        ]);

        assert_eq!(*hits.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn synchronous_handlers_end_once_after_the_whole_batch() {
        let loader = Loader::new(vec![immediate_handler(&["png"])]);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "a.png", "texture"),
            Resource::new("b", "b.png", "texture"),
        ]);

        assert_eq!(*log.borrow(), vec!["fileEnd:a", "fileEnd:b", "end"]);
    }

    #[test]
    fn later_completion_overwrites_item() {
        let loader = Loader::new(vec![]);
        let resource = Resource::new("a", "a.png", "texture");
        loader.file_load_end(resource.clone(), Payload::Failed("first".into()));
        loader.file_load_end(resource, Payload::Bytes(vec![1, 2].into()));

        assert!(matches!(loader.item("a"), Some(Payload::Bytes(bytes)) if bytes.len() == 2));
        assert_eq!(loader.item_count(), 1);
    }

    #[test]
    fn counter_join_ends_early_on_duplicate_completion() {
        let parked = Parked::default();
        let loader = Loader::new(vec![parking_handler(&["png"], &parked)]);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "a.png", "texture"),
            Resource::new("b", "b.png", "texture"),
        ]);
        loader.file_load_end(Resource::new("a", "a.png", "texture"), Payload::Bytes(Vec::new().into()));
        loader.file_load_end(Resource::new("a", "a.png", "texture"), Payload::Bytes(Vec::new().into()));

        assert_eq!(*log.borrow(), vec!["fileEnd:a", "fileEnd:a", "end"]);
    }

    #[test]
    fn tracked_join_ignores_duplicates() {
        let parked = Parked::default();
        let loader = Loader::with_join_policy(vec![parking_handler(&["png"], &parked)], JoinPolicy::Tracked);
        assert_eq!(loader.join_policy(), JoinPolicy::Tracked);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "a.png", "texture"),
            Resource::new("b", "b.png", "texture"),
        ]);
        loader.file_load_end(Resource::new("a", "a.png", "texture"), Payload::Bytes(Vec::new().into()));
        loader.file_load_end(Resource::new("a", "a.png", "texture"), Payload::Bytes(Vec::new().into()));
        assert_eq!(*log.borrow(), vec!["fileEnd:a"]);

        // The parked completion for `a` is now a duplicate as well.
        for completion in parked.borrow_mut().drain(..) {
            completion.complete(Payload::Bytes(Vec::new().into()));
        }
        loader.pump();

        assert_eq!(*log.borrow(), vec!["fileEnd:a", "fileEnd:b", "end"]);
    }

    #[test]
    fn tracked_join_does_not_wait_for_unroutable_resources() {
        let loader = Loader::with_join_policy(vec![immediate_handler(&["png"])], JoinPolicy::Tracked);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "a.png", "texture"),
            Resource::new("b", "b.xyz", "model"),
        ]);
        loader.load(&[Resource::new("c", "c.xyz", "model")]);

        assert_eq!(*log.borrow(), vec!["fileEnd:a", "end", "end"]);
    }

    #[test]
    fn dropped_completion_reports_failure() {
        let loader = Loader::new(vec![ExtensionHandler::new(["png"], |completion: Completion| {
            drop(completion);
        })]);

        loader.load(&[Resource::new("a", "a.png", "texture")]);

        assert_eq!(loader.loaded(), 1);
        assert!(loader.item("a").is_some_and(|payload| payload.is_failed()));
    }

    #[test]
    fn completes_from_worker_threads() {
        let loader = Loader::new(vec![ExtensionHandler::new(["png"], |completion: Completion| {
            std::thread::spawn(move || completion.complete(Payload::Bytes(vec![0; 4].into())));
        })]);
        let log = record_events(&loader);

        loader.load(&[
            Resource::new("a", "a.png", "texture"),
            Resource::new("b", "b.png", "texture"),
        ]);
        for _ in 0..100 {
            if log.borrow().last().map(String::as_str) == Some("end") {
                break;
            }
            loader.pump_timeout(Duration::from_millis(50));
        }

        assert_eq!(log.borrow().len(), 3);
        assert_eq!(log.borrow().last().map(String::as_str), Some("end"));
    }

    #[test]
    fn completions_after_loader_drop_are_discarded() {
        let parked = Parked::default();
        let loader = Loader::new(vec![parking_handler(&["png"], &parked)]);
        loader.load(&[Resource::new("a", "a.png", "texture")]);
        drop(loader);

        for completion in parked.borrow_mut().drain(..) {
            completion.complete(Payload::Bytes(Vec::new().into()));
        }
    }
}
