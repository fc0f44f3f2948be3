use std::hash::Hash;

use crate::cube::{Bit, Cube};
use crate::storage::{Mtbdd, Storage};

/// Returns an iterator over all root-to-leaf paths of the given MTBDD. Every
/// path is reported as a cube over the variables `0..width` together with
/// the leaf value it reaches; variables the path does not decide stay
/// don't-cares. Paths are visited in lexicographic order, low branch first.
pub fn paths<'a, L>(storage: &'a Storage<L>, root: &Mtbdd, width: usize) -> Paths<'a, L>
{
    Paths {
        storage,
        stack: vec![(root.clone(), Cube::any(width))],
    }
}

pub struct Paths<'a, L>
{
    storage: &'a Storage<L>,
    stack: Vec<(Mtbdd, Cube)>, // Pending subtrees of the depth-first search.
}

impl<L> Iterator for Paths<'_, L>
where
    L: Clone + Eq + Hash,
{
    type Item = (Cube, L);

    fn next(&mut self) -> Option<Self::Item>
    {
        while let Some((node, cube)) = self.stack.pop()
        {
            if self.storage.is_leaf(&node)
            {
                return Some((cube, self.storage.value(&node).clone()));
            }

            let var = self.storage.var(&node);
            let mut low_cube = cube.clone();
            low_cube.set(var, Bit::Zero);
            let mut high_cube = cube;
            high_cube.set(var, Bit::One);

            // Push the high branch first so the low branch is popped first.
            self.stack.push((self.storage.high(&node), high_cube));
            self.stack.push((self.storage.low(&node), low_cube));
        }

        None
    }
}
