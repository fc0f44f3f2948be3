use rustc_hash::FxHashMap;

/// The computed table: memoized results of apply operations, keyed by an
/// operator tag and the node indices of the operands. The cache is soft; it
/// refers to nodes by bare index and is dropped wholesale whenever the
/// storage runs a garbage collection, so it never outlives its entries.
///
/// A tag must identify the operator semantics uniquely within one storage.
/// Operators carrying per-instance state do not get a tag and bypass the
/// cache entirely, since a hit requires operator equality.
#[derive(Default)]
pub struct ApplyCache
{
    binary: FxHashMap<(u64, usize, usize), usize>,
    monadic: FxHashMap<(u64, usize), usize>,
}

impl ApplyCache
{
    pub fn binary(&self, tag: u64, lhs: usize, rhs: usize) -> Option<usize>
    {
        self.binary.get(&(tag, lhs, rhs)).copied()
    }

    pub fn insert_binary(&mut self, tag: u64, lhs: usize, rhs: usize, result: usize)
    {
        self.binary.insert((tag, lhs, rhs), result);
    }

    pub fn monadic(&self, tag: u64, operand: usize) -> Option<usize>
    {
        self.monadic.get(&(tag, operand)).copied()
    }

    pub fn insert_monadic(&mut self, tag: u64, operand: usize, result: usize)
    {
        self.monadic.insert((tag, operand), result);
    }

    pub fn clear(&mut self)
    {
        self.binary.clear();
        self.monadic.clear();
    }
}
