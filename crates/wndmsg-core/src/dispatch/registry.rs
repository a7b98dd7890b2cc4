//! Listener registry: `(filter, listener)` pairs in registration order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::event::TranslatedEvent;
use crate::domain::message::Category;

/// Unique id of a registration.  Ids are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Which categories a listener wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(HashSet<Category>),
}

impl CategoryFilter {
    pub fn all() -> Self {
        Self::All
    }

    pub fn only<I, C>(categories: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        Self::Only(categories.into_iter().map(Into::into).collect())
    }

    pub fn accepts(&self, category: &Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(category),
        }
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::All
    }
}

/// Receiver of translated events.
///
/// Called on the consumer thread during a dispatch tick.  Returning `Err` (or
/// panicking) counts as a listener fault: it is logged and the listener is
/// skipped for that event, but it stays registered.
pub trait EventListener: Send {
    fn on_event(&mut self, event: &TranslatedEvent) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: FnMut(&TranslatedEvent) -> anyhow::Result<()> + Send,
{
    fn on_event(&mut self, event: &TranslatedEvent) -> anyhow::Result<()> {
        self(event)
    }
}

pub(crate) type SharedListener = Arc<Mutex<Box<dyn EventListener>>>;

/// One registered listener.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: ListenerId,
    pub(crate) filter: Arc<CategoryFilter>,
    pub(crate) listener: SharedListener,
}

/// Ordered set of registrations.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<Registration>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns its id.
    pub fn subscribe(&mut self, filter: CategoryFilter, listener: Box<dyn EventListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Registration {
            id,
            filter: Arc::new(filter),
            listener: Arc::new(Mutex::new(listener)),
        });
        id
    }

    /// Removes a registration.  Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<ListenerId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cheap copy of the current registrations, taken at the start of a tick
    /// so listeners can (un)subscribe while being called.
    pub(crate) fn snapshot(&self) -> Vec<Registration> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<dyn EventListener> {
        Box::new(|_: &TranslatedEvent| -> anyhow::Result<()> { Ok(()) })
    }

    #[test]
    fn test_subscribe_assigns_unique_increasing_ids() {
        // Arrange
        let mut registry = ListenerRegistry::new();

        // Act
        let a = registry.subscribe(CategoryFilter::all(), noop());
        let b = registry.subscribe(CategoryFilter::all(), noop());

        // Assert
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(registry.ids(), vec![a, b]);
    }

    #[test]
    fn test_ids_are_not_reused_after_unsubscribe() {
        // Arrange
        let mut registry = ListenerRegistry::new();
        let first = registry.subscribe(CategoryFilter::all(), noop());

        // Act
        assert!(registry.unsubscribe(first));
        let second = registry.subscribe(CategoryFilter::all(), noop());

        // Assert
        assert_ne!(first, second);
    }

    #[test]
    fn test_unsubscribe_unknown_id_returns_false() {
        let mut registry = ListenerRegistry::new();
        assert!(!registry.unsubscribe(ListenerId(99)));
    }

    #[test]
    fn test_unsubscribe_keeps_order_of_others() {
        let mut registry = ListenerRegistry::new();
        let a = registry.subscribe(CategoryFilter::all(), noop());
        let b = registry.subscribe(CategoryFilter::all(), noop());
        let c = registry.subscribe(CategoryFilter::all(), noop());

        registry.unsubscribe(b);

        assert_eq!(registry.ids(), vec![a, c]);
        assert!(!registry.contains(b));
    }

    #[test]
    fn test_filter_only_accepts_listed_categories() {
        let filter = CategoryFilter::only([Category::DEVICE_CHANGE]);
        assert!(filter.accepts(&Category::new(Category::DEVICE_CHANGE)));
        assert!(!filter.accepts(&Category::new(Category::POWER_EVENT)));
        assert!(CategoryFilter::all().accepts(&Category::new("Anything")));
    }
}
