//! Sequential loading of named asset groups.
//!
//! [`Resources`] pushes a fixed list of groups through a shared [`Loader`]
//! one at a time. A group is submitted only after the previous one ended, so
//! collaborators can react to `groupEnd` for a specific group (the world
//! builds the sphere once `base` is done) without polling.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::{Rc, Weak},
};

use serde::{Deserialize, Serialize};

use crate::{
    events::{unique_namespace, EventEmitter},
    loader::{Loader, LoaderEvent, Payload, Resource, Texture, TEXTURE_TYPE},
};

/// Named, ordered set of resources loaded as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub name: String,
    /// Free-form data attached to the group by configuration.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub items: Vec<Resource>,
    #[serde(skip)]
    pub to_load: usize,
    #[serde(skip)]
    pub loaded: usize,
}

impl AssetGroup {
    pub fn new(name: impl Into<String>, items: Vec<Resource>) -> Self {
        Self {
            name: name.into(),
            items,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.to_load
    }
}

/// Events emitted by [`Resources`].
#[derive(Debug, Clone)]
pub enum ResourcesEvent {
    Progress {
        group: Option<AssetGroup>,
        resource: Resource,
        data: Payload,
    },
    GroupEnd {
        group: Option<AssetGroup>,
    },
    End,
}

impl ResourcesEvent {
    pub const PROGRESS: &'static str = "progress";
    pub const GROUP_END: &'static str = "groupEnd";
    pub const END: &'static str = "end";
}

/// Where the sequencer is in its group list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPhase {
    /// Not started, or started with nothing to load.
    Idle,
    /// A group's items are in flight.
    Loading,
    /// Every group has ended.
    AllDone,
}

#[derive(Debug, Default)]
struct Groups {
    pending: VecDeque<AssetGroup>,
    current: Option<AssetGroup>,
    loaded: Vec<AssetGroup>,
    finished: bool,
}

#[derive(Debug)]
struct Shared {
    events: EventEmitter<ResourcesEvent>,
    groups: RefCell<Groups>,
    items: RefCell<HashMap<String, Payload>>,
}

/// Group sequencer driving a [`Loader`].
#[derive(Debug)]
pub struct Resources {
    loader: Rc<Loader>,
    shared: Rc<Shared>,
    /// Loader namespace owned by this sequencer.
    namespace: String,
}

impl Resources {
    /// Subscribes to the loader under a namespace of its own, so several
    /// sequencers can share one loader. Nothing is loaded until [`start`].
    ///
    /// [`start`]: Resources::start
    pub fn new(groups: Vec<AssetGroup>, loader: Rc<Loader>) -> Self {
        let shared = Rc::new(Shared {
            events: EventEmitter::new(),
            groups: RefCell::new(Groups {
                pending: groups.into(),
                ..Default::default()
            }),
            items: RefCell::new(HashMap::new()),
        });

        let namespace = unique_namespace("resources");
        let weak = Rc::downgrade(&shared);
        loader
            .events()
            .on(&format!("fileEnd.{namespace}"), move |event: &LoaderEvent| {
                if let (Some(shared), LoaderEvent::FileEnd { resource, data }) =
                    (weak.upgrade(), event)
                {
                    shared.file_end(resource, data);
                }
            });

        let weak = Rc::downgrade(&shared);
        let weak_loader = Rc::downgrade(&loader);
        loader.events().on(&format!("end.{namespace}"), move |_: &LoaderEvent| {
            if let (Some(shared), Some(loader)) = (weak.upgrade(), weak_loader.upgrade()) {
                shared.group_end(&loader);
            }
        });

        Self {
            loader,
            shared,
            namespace,
        }
    }

    /// Submits the first group.
    pub fn start(&self) {
        load_next_group(&self.shared, &self.loader);
    }

    pub fn events(&self) -> &EventEmitter<ResourcesEvent> {
        &self.shared.events
    }

    pub fn loader(&self) -> &Rc<Loader> {
        &self.loader
    }

    pub fn phase(&self) -> GroupPhase {
        let groups = self.shared.groups.borrow();
        if groups.finished {
            GroupPhase::AllDone
        } else if groups.current.is_some() {
            GroupPhase::Loading
        } else {
            GroupPhase::Idle
        }
    }

    pub fn current_group(&self) -> Option<AssetGroup> {
        self.shared.groups.borrow().current.clone()
    }

    /// Names of the groups that have ended, in order.
    pub fn loaded_groups(&self) -> Vec<String> {
        self.shared
            .groups
            .borrow()
            .loaded
            .iter()
            .map(|group| group.name.clone())
            .collect()
    }

    pub fn pending_groups(&self) -> usize {
        self.shared.groups.borrow().pending.len()
    }

    /// Converted payload for a resource name.
    pub fn item(&self, name: &str) -> Option<Payload> {
        self.shared.items.borrow().get(name).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.shared.items.borrow().len()
    }

    /// Releases every loaded item.
    pub fn dispose(&self) {
        let released = self.shared.items.borrow_mut().drain().count();
        tracing::debug!(released, "disposed resources");
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        self.loader.events().off(&format!("{}.", self.namespace));
    }
}

impl Shared {
    fn file_end(&self, resource: &Resource, data: &Payload) {
        let data = if resource.kind == TEXTURE_TYPE {
            to_texture(data)
        } else {
            data.clone()
        };
        self.items
            .borrow_mut()
            .insert(resource.name.clone(), data.clone());

        let group = {
            let mut groups = self.groups.borrow_mut();
            if let Some(current) = groups.current.as_mut() {
                current.loaded += 1;
            }
            groups.current.clone()
        };

        self.events.trigger(
            ResourcesEvent::PROGRESS,
            &ResourcesEvent::Progress {
                group,
                resource: resource.clone(),
                data,
            },
        );
    }

    fn group_end(self: &Rc<Self>, loader: &Loader) {
        let (group, more) = {
            let mut groups = self.groups.borrow_mut();
            let group = groups.current.take();
            if let Some(group) = &group {
                groups.loaded.push(group.clone());
            }
            (group, !groups.pending.is_empty())
        };

        if let Some(group) = &group {
            tracing::info!(group = %group.name, loaded = group.loaded, "asset group loaded");
        }
        self.events
            .trigger(ResourcesEvent::GROUP_END, &ResourcesEvent::GroupEnd { group });

        if more {
            load_next_group(self, loader);
        } else {
            self.groups.borrow_mut().finished = true;
            tracing::info!("all asset groups loaded");
            self.events.trigger(ResourcesEvent::END, &ResourcesEvent::End);
        }
    }
}

fn load_next_group(shared: &Rc<Shared>, loader: &Loader) {
    let items = {
        let mut groups = shared.groups.borrow_mut();
        if groups.current.is_some() {
            return;
        }
        let Some(mut group) = groups.pending.pop_front() else {
            return;
        };
        group.to_load = group.items.len();
        group.loaded = 0;
        tracing::debug!(group = %group.name, to_load = group.to_load, "loading asset group");
        let items = group.items.clone();
        groups.current = Some(group);
        items
    };

    // The loader never ends an empty batch on its own.
    if items.is_empty() {
        shared.group_end(loader);
    } else {
        loader.load(&items);
    }
}

/// Wraps decoded images; existing textures are flagged for re-upload.
fn to_texture(data: &Payload) -> Payload {
    match data {
        Payload::Image(image) => Payload::Texture(Texture::new(image.clone())),
        Payload::Texture(texture) => {
            let mut texture = texture.clone();
            texture.needs_update = true;
            Payload::Texture(texture)
        }
        other => other.clone(),
    }
}
