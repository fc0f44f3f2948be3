use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A root handle. Every Mtbdd pins its node in the storage table by keeping
/// an entry in the shared protection set; cloning the handle protects the
/// node again and dropping it releases the protection. Nodes reachable from
/// no protected root may be garbage collected.
pub struct Mtbdd
{
    index: usize, // Index in the node table.
    slot: usize,  // Slot in the protection set.
    protect: Rc<RefCell<ProtectionSet>>,
}

impl Mtbdd
{
    pub(crate) fn new(protect: &Rc<RefCell<ProtectionSet>>, index: usize) -> Mtbdd
    {
        let slot = protect.borrow_mut().protect(index);
        Mtbdd { protect: Rc::clone(protect), index, slot }
    }

    pub fn index(&self) -> usize
    {
        self.index
    }
}

impl Clone for Mtbdd
{
    fn clone(&self) -> Self
    {
        Mtbdd::new(&self.protect, self.index)
    }
}

impl Drop for Mtbdd
{
    fn drop(&mut self)
    {
        self.protect.borrow_mut().unprotect(self.slot);
    }
}

impl PartialEq for Mtbdd
{
    fn eq(&self, other: &Self) -> bool
    {
        debug_assert!(
            Rc::ptr_eq(&self.protect, &other.protect),
            "Both MTBDDs should refer to the same storage."
        );
        self.index == other.index
    }
}

impl Eq for Mtbdd {}

impl Hash for Mtbdd
{
    fn hash<H: Hasher>(&self, state: &mut H)
    {
        self.index.hash(state);
    }
}

impl Debug for Mtbdd
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        write!(f, "node {}", self.index)
    }
}

enum Slot
{
    Protected(usize),   // Index of the protected node.
    Free(Option<usize>), // Next entry of the free list.
}

/// The protection set tracks which nodes are pinned by a live root handle
/// and therefore must survive garbage collection.
pub struct ProtectionSet
{
    slots: Vec<Slot>,
    free: Option<usize>,
    live: usize,
    number_of_insertions: u64,
}

impl ProtectionSet
{
    pub fn new() -> Self
    {
        ProtectionSet {
            slots: Vec::new(),
            free: None,
            live: 0,
            number_of_insertions: 0,
        }
    }

    /// The number of currently protected roots.
    pub fn live(&self) -> usize
    {
        self.live
    }

    /// The total number of insertions into the protection set.
    pub fn number_of_insertions(&self) -> u64
    {
        self.number_of_insertions
    }

    /// Iterates over the node indices of all protected roots.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_
    {
        self.slots.iter().filter_map(|slot| match slot
        {
            Slot::Protected(index) => Some(*index),
            Slot::Free(_) => None,
        })
    }

    /// Protect the given node index and return the occupied slot.
    fn protect(&mut self, index: usize) -> usize
    {
        self.number_of_insertions += 1;
        self.live += 1;

        match self.free
        {
            None =>
            {
                self.slots.push(Slot::Protected(index));
                self.slots.len() - 1
            }
            Some(first) =>
            {
                match self.slots[first]
                {
                    Slot::Free(next) => self.free = next,
                    Slot::Protected(_) => panic!("free list points at a protected slot"),
                }

                self.slots[first] = Slot::Protected(index);
                first
            }
        }
    }

    /// Release the protection held by the given slot.
    fn unprotect(&mut self, slot: usize)
    {
        debug_assert!(matches!(self.slots[slot], Slot::Protected(_)));

        self.slots[slot] = Slot::Free(self.free);
        self.free = Some(slot);
        self.live -= 1;
    }
}

impl Default for ProtectionSet
{
    fn default() -> Self
    {
        Self::new()
    }
}
