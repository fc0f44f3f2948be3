use std::fmt;
use std::hash::Hash;

use crate::iterators::paths;
use crate::storage::{Mtbdd, Storage};

/// Return a formatter for the given MTBDD root.
pub fn fmt_node<'a, L>(storage: &'a Storage<L>, root: &Mtbdd, width: usize) -> Display<'a, L>
{
    Display {
        storage,
        root: root.clone(),
        width,
    }
}

/// Prints the cube-to-leaf map represented by an MTBDD, one path per line.
/// Paths reaching the background value are omitted.
pub struct Display<'a, L>
{
    storage: &'a Storage<L>,
    root: Mtbdd,
    width: usize,
}

impl<L> fmt::Display for Display<'_, L>
where
    L: Clone + Eq + Hash + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "{{")?;
        for (cube, value) in paths(self.storage, &self.root, self.width)
        {
            if value == *self.storage.background()
            {
                continue;
            }

            writeln!(f, "  {} -> {}", cube, value)?;
        }
        write!(f, "}}")
    }
}
