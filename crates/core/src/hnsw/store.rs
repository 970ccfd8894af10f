//! Append-only item storage addressed by node id.

/// Dense node identifier, assigned sequentially from 0.
pub type NodeId = u32;

/// Append-only container mapping node ids to items.
///
/// Ids are dense and never reused. The store has no internal synchronization:
/// the owning graph serializes writers.
#[derive(Debug, Clone)]
pub struct VectorStore<T> {
    items: Vec<T>,
}

impl<T> Default for VectorStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> VectorStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append items, returning their new ids in input order.
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted.
    pub fn append<I: IntoIterator<Item = T>>(&mut self, items: I) -> Vec<NodeId> {
        items.into_iter().map(|item| self.push(item)).collect()
    }

    /// Append a single item and return its id.
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted.
    pub fn push(&mut self, item: T) -> NodeId {
        let id = node_id(self.items.len());
        self.items.push(item);
        id
    }

    /// Drop every item from position `len` on.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// O(1) lookup. Panics if `id` was never assigned.
    #[inline]
    pub fn get(&self, id: NodeId) -> &T {
        &self.items[id as usize]
    }

    /// Checked lookup.
    #[inline]
    pub fn try_get(&self, id: NodeId) -> Option<&T> {
        self.items.get(id as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (i as NodeId, item))
    }
}

/// Id for the item at `index`.
fn node_id(index: usize) -> NodeId {
    match NodeId::try_from(index) {
        Ok(id) => id,
        Err(_) => panic!("node id space exhausted at {index} items"),
    }
}
