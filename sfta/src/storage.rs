use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use log::warn;
use rustc_hash::FxHashMap;

pub use self::mtbdd::Mtbdd;
use self::cache::ApplyCache;
use self::mtbdd::ProtectionSet;

mod cache;
mod mtbdd;

/// Index of a decision variable. Variables are ordered by index and every
/// root-to-leaf path visits them in strictly increasing order.
pub type Variable = u32;

/// An MTBDD node: an internal decision node with the cofactors for
/// variable = 0 and variable = 1, or a terminal carrying a leaf value.
enum Node<L>
{
    Internal { var: Variable, low: usize, high: usize },
    Leaf(L),
}

struct Entry<L>
{
    node: Node<L>,
    marked: bool,
}

/// The storage implements maximal sharing: structurally equal nodes have a
/// unique index in the node table, so two MTBDDs denote the same function
/// iff their indices match. All node creation goes through [Storage::insert]
/// and [Storage::constant], which consult the unique table and apply the
/// reduction rule before allocating.
pub struct Storage<L>
{
    protection_set: Rc<RefCell<ProtectionSet>>,
    table: Vec<Option<Entry<L>>>,
    internal_index: FxHashMap<(Variable, usize, usize), usize>,
    leaf_index: FxHashMap<L, usize>,
    free: Vec<usize>, // A list of free positions in the table.
    cache: ApplyCache,

    count_until_collection: u64, // Count down until the next garbage collection.
    enable_garbage_collection: bool,
    variables: Variable,
    background: usize,
}

impl<L> Storage<L>
where
    L: Clone + Eq + Hash,
{
    /// Creates a storage whose background (the leaf meaning "undefined") is
    /// the given value.
    pub fn new(background: L) -> Self
    {
        let shared = Rc::new(RefCell::new(ProtectionSet::new()));

        let mut leaf_index = FxHashMap::default();
        leaf_index.insert(background.clone(), 0);

        Self {
            protection_set: shared,
            table: vec![Some(Entry { node: Node::Leaf(background), marked: false })],
            internal_index: FxHashMap::default(),
            leaf_index,
            free: Vec::new(),
            cache: ApplyCache::default(),
            count_until_collection: 10000,
            enable_garbage_collection: true,
            variables: 0,
            background: 0,
        }
    }

    /// Allocates a fresh variable at the bottom of the current order.
    pub fn create_variable(&mut self) -> Variable
    {
        let var = self.variables;
        self.variables += 1;
        var
    }

    pub fn variable_count(&self) -> Variable
    {
        self.variables
    }

    /// Returns the root for the terminal with the given leaf value.
    pub fn constant(&mut self, value: L) -> Mtbdd
    {
        self.collect_if_due();

        if let Some(index) = self.leaf_index.get(&value)
        {
            return Mtbdd::new(&self.protection_set, *index);
        }

        let index = self.allocate(Node::Leaf(value.clone()));
        self.leaf_index.insert(value, index);
        Mtbdd::new(&self.protection_set, index)
    }

    /// Creates the internal node (var, low, high). The children must be
    /// below `var` in the variable order.
    pub fn insert(&mut self, var: Variable, low: &Mtbdd, high: &Mtbdd) -> Mtbdd
    {
        debug_assert!(var < self.variables, "unknown variable {}", var);
        debug_assert!(
            self.top_var(low).map_or(true, |child| var < child),
            "low child violates the variable order"
        );
        debug_assert!(
            self.top_var(high).map_or(true, |child| var < child),
            "high child violates the variable order"
        );

        // Reduction: a node with equal children is the child itself.
        if low.index() == high.index()
        {
            return low.clone();
        }

        self.collect_if_due();

        let key = (var, low.index(), high.index());
        if let Some(index) = self.internal_index.get(&key)
        {
            return Mtbdd::new(&self.protection_set, *index);
        }

        let index = self.allocate(Node::Internal { var, low: low.index(), high: high.index() });
        self.internal_index.insert(key, index);
        Mtbdd::new(&self.protection_set, index)
    }

    /// A root handle for the background terminal.
    pub fn background_root(&self) -> Mtbdd
    {
        Mtbdd::new(&self.protection_set, self.background)
    }

    pub fn background(&self) -> &L
    {
        match &self.entry(self.background).node
        {
            Node::Leaf(value) => value,
            Node::Internal { .. } => panic!("background is not a terminal"),
        }
    }

    /// Replaces the background value. Only affects roots created afterwards;
    /// existing MTBDDs keep the leaves they were built with.
    pub fn set_background(&mut self, value: L)
    {
        let root = self.constant(value);
        self.background = root.index();
    }

    pub fn is_leaf(&self, f: &Mtbdd) -> bool
    {
        matches!(self.entry(f.index()).node, Node::Leaf(_))
    }

    /// The decision variable of an internal node. The node must not be a
    /// terminal.
    pub fn var(&self, f: &Mtbdd) -> Variable
    {
        match &self.entry(f.index()).node
        {
            Node::Internal { var, .. } => *var,
            Node::Leaf(_) => panic!("attempt to read the variable of a terminal"),
        }
    }

    /// The variable of `f` if it is internal.
    pub fn top_var(&self, f: &Mtbdd) -> Option<Variable>
    {
        match &self.entry(f.index()).node
        {
            Node::Internal { var, .. } => Some(*var),
            Node::Leaf(_) => None,
        }
    }

    pub fn low(&self, f: &Mtbdd) -> Mtbdd
    {
        match &self.entry(f.index()).node
        {
            Node::Internal { low, .. } => Mtbdd::new(&self.protection_set, *low),
            Node::Leaf(_) => panic!("attempt to read the cofactor of a terminal"),
        }
    }

    pub fn high(&self, f: &Mtbdd) -> Mtbdd
    {
        match &self.entry(f.index()).node
        {
            Node::Internal { high, .. } => Mtbdd::new(&self.protection_set, *high),
            Node::Leaf(_) => panic!("attempt to read the cofactor of a terminal"),
        }
    }

    /// The leaf value of a terminal node. The node must not be internal.
    pub fn value(&self, f: &Mtbdd) -> &L
    {
        match &self.entry(f.index()).node
        {
            Node::Leaf(value) => value,
            Node::Internal { .. } => panic!("attempt to read the value of an internal node"),
        }
    }

    /// The number of live nodes in the table.
    pub fn node_count(&self) -> usize
    {
        self.table.len() - self.free.len()
    }

    /// The number of root handles currently alive.
    pub fn live_roots(&self) -> usize
    {
        self.protection_set.borrow().live()
    }

    /// Reclaims all nodes that are unreachable from a protected root. The
    /// computed cache refers to nodes by bare index and is dropped first.
    pub fn garbage_collect(&mut self)
    {
        self.cache.clear();

        let mut stack: Vec<usize> = Vec::new();
        mark_node(&mut self.table, &mut stack, self.background);
        let roots: Vec<usize> = self.protection_set.borrow().iter().collect();
        for root in roots
        {
            mark_node(&mut self.table, &mut stack, root);
        }

        for index in 0..self.table.len()
        {
            let reclaim = match &mut self.table[index]
            {
                None => false,
                Some(entry) =>
                {
                    if entry.marked
                    {
                        entry.marked = false;
                        false
                    }
                    else
                    {
                        match &entry.node
                        {
                            Node::Internal { var, low, high } =>
                            {
                                self.internal_index.remove(&(*var, *low, *high));
                            }
                            Node::Leaf(value) =>
                            {
                                self.leaf_index.remove(value);
                            }
                        }
                        true
                    }
                }
            };

            if reclaim
            {
                self.table[index] = None;
                self.free.push(index);
            }
        }
    }

    /// Enables automatic garbage collection, which is enabled by default.
    pub fn enable_garbage_collection(&mut self, enabled: bool)
    {
        self.enable_garbage_collection = enabled;
    }

    pub(crate) fn cached_binary(&self, tag: u64, lhs: &Mtbdd, rhs: &Mtbdd) -> Option<Mtbdd>
    {
        self.cache
            .binary(tag, lhs.index(), rhs.index())
            .map(|index| Mtbdd::new(&self.protection_set, index))
    }

    pub(crate) fn cache_binary(&mut self, tag: u64, lhs: &Mtbdd, rhs: &Mtbdd, result: &Mtbdd)
    {
        self.cache.insert_binary(tag, lhs.index(), rhs.index(), result.index());
    }

    pub(crate) fn cached_monadic(&self, tag: u64, operand: &Mtbdd) -> Option<Mtbdd>
    {
        self.cache
            .monadic(tag, operand.index())
            .map(|index| Mtbdd::new(&self.protection_set, index))
    }

    pub(crate) fn cache_monadic(&mut self, tag: u64, operand: &Mtbdd, result: &Mtbdd)
    {
        self.cache.insert_monadic(tag, operand.index(), result.index());
    }

    fn collect_if_due(&mut self)
    {
        if self.count_until_collection == 0
        {
            if self.enable_garbage_collection
            {
                self.garbage_collect();
            }
            self.count_until_collection = self.table.len() as u64;
        }
    }

    fn allocate(&mut self, node: Node<L>) -> usize
    {
        let entry = Entry { node, marked: false };

        match self.free.pop()
        {
            Some(index) =>
            {
                // Reuse an existing position in the table.
                self.table[index] = Some(entry);
                index
            }
            None =>
            {
                self.count_until_collection = self.count_until_collection.saturating_sub(1);
                self.table.push(Some(entry));
                self.table.len() - 1
            }
        }
    }

    fn entry(&self, index: usize) -> &Entry<L>
    {
        match &self.table[index]
        {
            Some(entry) => entry,
            None => panic!("node {} was garbage collected", index),
        }
    }
}

impl<L> Drop for Storage<L>
{
    fn drop(&mut self)
    {
        // Any root handle still alive at shutdown is a leak on the side of
        // the caller; report it but do not fail.
        let unreferenced = self.protection_set.borrow().live();
        if unreferenced > 0
        {
            warn!("still {} root handles referenced at engine shutdown", unreferenced);
        }
    }
}

/// Mark all nodes reachable from the given root index.
///
/// Reuses the stack for the depth-first exploration.
fn mark_node<L>(table: &mut [Option<Entry<L>>], stack: &mut Vec<usize>, root: usize)
{
    stack.push(root);
    while let Some(current) = stack.pop()
    {
        let entry = match &mut table[current]
        {
            Some(entry) => entry,
            None => panic!("protected node {} was garbage collected", current),
        };

        if entry.marked
        {
            continue;
        }

        entry.marked = true;
        if let Node::Internal { low, high, .. } = &entry.node
        {
            stack.push(*low);
            stack.push(*high);
        }
    }

    debug_assert!(stack.is_empty(), "When marking finishes the stack should be empty");
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn structurally_equal_nodes_share_an_index()
    {
        let mut storage: Storage<u64> = Storage::new(0);
        let var = storage.create_variable();

        let low = storage.constant(0);
        let high = storage.constant(1);
        let first = storage.insert(var, &low, &high);
        let second = storage.insert(var, &low, &high);

        assert_eq!(first, second);
        assert_eq!(first.index(), second.index());
    }

    #[test]
    fn equal_children_reduce_to_the_child()
    {
        let mut storage: Storage<u64> = Storage::new(0);
        let var = storage.create_variable();

        let leaf = storage.constant(7);
        let reduced = storage.insert(var, &leaf, &leaf);

        assert_eq!(reduced, leaf);
    }

    #[test]
    fn background_is_interned_once()
    {
        let mut storage: Storage<u64> = Storage::new(0);

        let explicit = storage.constant(0);
        assert_eq!(explicit, storage.background_root());
        assert_eq!(*storage.background(), 0);
    }

    #[test]
    fn garbage_collection_reclaims_unprotected_nodes()
    {
        let mut storage: Storage<u64> = Storage::new(0);
        let var = storage.create_variable();

        {
            let low = storage.constant(1);
            let high = storage.constant(2);
            let _node = storage.insert(var, &low, &high);

            storage.garbage_collect();
            assert_eq!(storage.node_count(), 4); // background + 2 leaves + node
        }

        storage.garbage_collect();
        assert_eq!(storage.node_count(), 1); // only the background remains
    }

    #[test]
    fn collection_keeps_children_of_protected_roots()
    {
        let mut storage: Storage<u64> = Storage::new(0);
        let var = storage.create_variable();

        let root;
        {
            let low = storage.constant(1);
            let high = storage.constant(2);
            root = storage.insert(var, &low, &high);
        }

        storage.garbage_collect();

        // The children are reachable from the root and must have survived.
        assert_eq!(*storage.value(&storage.low(&root)), 1);
        assert_eq!(*storage.value(&storage.high(&root)), 2);
    }

    #[test]
    fn live_roots_reflect_dropped_handles()
    {
        let mut storage: Storage<u64> = Storage::new(0);

        let mut roots = Vec::new();
        for value in 0..100
        {
            roots.push(storage.constant(value));
        }
        assert_eq!(storage.live_roots(), 100);

        roots.truncate(1);
        assert_eq!(storage.live_roots(), 1);

        // Dropping the storage now reports the remaining root as leaked.
    }

    #[test]
    fn replacing_the_background_affects_new_roots()
    {
        let mut storage: Storage<u64> = Storage::new(0);

        storage.set_background(9);

        assert_eq!(*storage.background(), 9);
        let root = storage.background_root();
        assert_eq!(*storage.value(&root), 9);
    }

    #[test]
    #[should_panic(expected = "variable order")]
    fn out_of_order_children_are_rejected()
    {
        let mut storage: Storage<u64> = Storage::new(0);
        let below = storage.create_variable();
        let above = storage.create_variable();

        let low = storage.constant(1);
        let high = storage.constant(2);
        let child = storage.insert(below, &low, &high);

        let background = storage.background_root();
        storage.insert(above, &child, &background);
    }

    #[test]
    #[should_panic(expected = "variable of a terminal")]
    fn reading_the_variable_of_a_terminal_is_misuse()
    {
        let mut storage: Storage<u64> = Storage::new(0);
        let leaf = storage.constant(3);

        storage.var(&leaf);
    }
}
