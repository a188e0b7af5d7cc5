//! Namespaced publish/subscribe dispatch.
//!
//! Every emitter owns a two-level ordered registry: namespace → event name →
//! callbacks in subscription order. Names are given as `value[.namespace]`
//! tokens; an unqualified name reaches every namespace when triggering or
//! unsubscribing, which lets collaborators subscribe under their own
//! namespace for bulk removal while staying reachable by plain triggers.
//!
//! Malformed input is logged and ignored. Nothing here returns an error.

mod names;

use std::{cell::RefCell, fmt, rc::Rc};

use names::namespace_only;
pub use names::{resolve_names, unique_namespace, EventName, BASE_NAMESPACE};

/// Shared callback stored in the registry.
pub type Callback<E> = Rc<dyn Fn(&E)>;

struct EventSlot<E> {
    name: String,
    callbacks: Vec<Callback<E>>,
}

struct Namespace<E> {
    name: String,
    events: Vec<EventSlot<E>>,
}

impl<E> Namespace<E> {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Vec::new(),
        }
    }

    fn slot_mut(&mut self, event: &str) -> &mut EventSlot<E> {
        let index = match self.events.iter().position(|slot| slot.name == event) {
            Some(index) => index,
            None => {
                self.events.push(EventSlot {
                    name: event.to_string(),
                    callbacks: Vec::new(),
                });
                self.events.len() - 1
            }
        };
        &mut self.events[index]
    }

    fn callbacks(&self, event: &str) -> Option<&[Callback<E>]> {
        self.events
            .iter()
            .find(|slot| slot.name == event)
            .map(|slot| slot.callbacks.as_slice())
    }

    fn remove(&mut self, event: &str) {
        self.events.retain(|slot| slot.name != event);
    }
}

struct Registry<E> {
    namespaces: Vec<Namespace<E>>,
}

impl<E> Registry<E> {
    fn new() -> Self {
        Self {
            namespaces: vec![Namespace::new(BASE_NAMESPACE)],
        }
    }

    fn namespace_mut(&mut self, name: &str) -> &mut Namespace<E> {
        let index = match self.namespaces.iter().position(|ns| ns.name == name) {
            Some(index) => index,
            None => {
                self.namespaces.push(Namespace::new(name));
                self.namespaces.len() - 1
            }
        };
        &mut self.namespaces[index]
    }

    fn remove_namespace(&mut self, name: &str) {
        if name == BASE_NAMESPACE {
            if let Some(base) = self.namespaces.iter_mut().find(|ns| ns.name == name) {
                base.events.clear();
            }
        } else {
            self.namespaces.retain(|ns| ns.name != name);
        }
    }

    /// Drops namespaces with no event names left. `base` always stays.
    fn prune(&mut self) {
        self.namespaces
            .retain(|ns| ns.name == BASE_NAMESPACE || !ns.events.is_empty());
    }
}

/// Namespaced event dispatcher carrying events of type `E`.
///
/// All methods take `&self`, so a callback may subscribe, unsubscribe or
/// trigger on the emitter that is currently dispatching to it. Dispatch runs
/// over a snapshot of the matching callbacks.
pub struct EventEmitter<E> {
    registry: RefCell<Registry<E>>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(Registry::new()),
        }
    }

    /// Subscribes `callback` to every name in `names`.
    ///
    /// Names are separated by spaces, commas or slashes. The same callback
    /// subscribed twice to one name fires twice.
    pub fn on<F>(&self, names: &str, callback: F) -> &Self
    where
        F: Fn(&E) + 'static,
    {
        let tokens = resolve_names(names);
        if tokens.is_empty() {
            tracing::warn!(names, "ignoring subscription with empty event names");
            return self;
        }

        let callback: Callback<E> = Rc::new(callback);
        let mut registry = self.registry.borrow_mut();
        for token in &tokens {
            let name = EventName::parse(token);
            registry
                .namespace_mut(&name.namespace)
                .slot_mut(&name.value)
                .callbacks
                .push(Rc::clone(&callback));
        }

        self
    }

    /// Removes subscriptions.
    ///
    /// `ns.` (or `.ns`), or any token with a namespace but no value, removes
    /// the whole namespace. An unqualified name is
    /// removed from every namespace; a qualified one only from its own.
    pub fn off(&self, names: &str) -> &Self {
        let tokens = resolve_names(names);
        if tokens.is_empty() {
            tracing::warn!(names, "ignoring unsubscription with empty event names");
            return self;
        }

        let mut registry = self.registry.borrow_mut();
        for token in &tokens {
            if let Some(namespace) = namespace_only(token) {
                registry.remove_namespace(namespace);
                continue;
            }

            let name = EventName::parse(token);
            if !name.is_unqualified() && name.value.is_empty() {
                registry.remove_namespace(&name.namespace);
                continue;
            }
            if name.is_unqualified() {
                for namespace in registry.namespaces.iter_mut() {
                    namespace.remove(&name.value);
                }
            } else if let Some(namespace) = registry
                .namespaces
                .iter_mut()
                .find(|ns| ns.name == name.namespace)
            {
                namespace.remove(&name.value);
            }
            registry.prune();
        }

        self
    }

    /// Invokes the callbacks registered under the first name in `name`.
    ///
    /// Only the first token is honoured. Unqualified names dispatch across
    /// every namespace in registry order, subscription order within each.
    pub fn trigger(&self, name: &str, event: &E) {
        let Some(token) = resolve_names(name).into_iter().next() else {
            tracing::warn!(name, "ignoring trigger with empty event name");
            return;
        };

        let name = EventName::parse(&token);
        let snapshot: Vec<Callback<E>> = {
            let registry = self.registry.borrow();
            if name.is_unqualified() {
                registry
                    .namespaces
                    .iter()
                    .filter_map(|ns| ns.callbacks(&name.value))
                    .flat_map(|callbacks| callbacks.iter().cloned())
                    .collect()
            } else {
                if name.value.is_empty() {
                    tracing::warn!(namespace = %name.namespace, "ignoring trigger without event value");
                    return;
                }
                registry
                    .namespaces
                    .iter()
                    .find(|ns| ns.name == name.namespace)
                    .and_then(|ns| ns.callbacks(&name.value))
                    .map(|callbacks| callbacks.to_vec())
                    .unwrap_or_default()
            }
        };

        for callback in snapshot {
            callback(event);
        }
    }

    /// Returns `true` if any namespace has callbacks for `value`.
    pub fn has_listeners(&self, value: &str) -> bool {
        self.registry
            .borrow()
            .namespaces
            .iter()
            .filter_map(|ns| ns.callbacks(value))
            .any(|callbacks| !callbacks.is_empty())
    }

    /// Namespace names in registry order.
    pub fn namespaces(&self) -> Vec<String> {
        self.registry
            .borrow()
            .namespaces
            .iter()
            .map(|ns| ns.name.clone())
            .collect()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut map = f.debug_map();
        for namespace in &registry.namespaces {
            let events: Vec<(&str, usize)> = namespace
                .events
                .iter()
                .map(|slot| (slot.name.as_str(), slot.callbacks.len()))
                .collect();
            map.entry(&namespace.name, &events);
        }
        map.finish()
    }
}
