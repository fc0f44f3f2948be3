use std::fmt::Display;
use std::hash::Hash;
use std::io::{self, Write};

use rustc_hash::FxHashSet;

use crate::storage::{Mtbdd, Storage};

/// Writes the MTBDD DAG reachable from the given named roots as a Graphviz
/// digraph. Internal nodes are drawn as circles labelled with their
/// variable, terminals as boxes labelled with their leaf value; high edges
/// are solid and low edges dashed.
pub fn dump_dot<L, W>(storage: &Storage<L>, roots: &[(String, Mtbdd)], out: &mut W) -> io::Result<()>
where
    L: Clone + Eq + Hash + Display,
    W: Write,
{
    writeln!(out, "digraph mtbdd {{")?;

    // Collect the reachable nodes depth-first.
    let mut visited: FxHashSet<usize> = FxHashSet::default();
    let mut stack: Vec<Mtbdd> = roots.iter().map(|(_, root)| root.clone()).collect();
    let mut nodes: Vec<Mtbdd> = Vec::new();

    while let Some(node) = stack.pop()
    {
        if !visited.insert(node.index())
        {
            continue;
        }

        if !storage.is_leaf(&node)
        {
            stack.push(storage.low(&node));
            stack.push(storage.high(&node));
        }

        nodes.push(node);
    }

    for node in &nodes
    {
        if storage.is_leaf(node)
        {
            writeln!(
                out,
                "  n{} [shape=box, label=\"{}\"];",
                node.index(),
                storage.value(node)
            )?;
        }
        else
        {
            writeln!(out, "  n{} [shape=circle, label=\"x{}\"];", node.index(), storage.var(node))?;
        }
    }

    for node in &nodes
    {
        if storage.is_leaf(node)
        {
            continue;
        }

        writeln!(out, "  n{} -> n{};", node.index(), storage.high(node).index())?;
        writeln!(out, "  n{} -> n{} [style=dashed];", node.index(), storage.low(node).index())?;
    }

    for (position, (name, root)) in roots.iter().enumerate()
    {
        writeln!(out, "  r{} [shape=plaintext, label=\"{}\"];", position, name)?;
        writeln!(out, "  r{} -> n{};", position, root.index())?;
    }

    writeln!(out, "}}")
}
