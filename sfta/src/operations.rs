use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::cube::{Bit, Cube};
use crate::storage::{Mtbdd, Storage, Variable};

/// A binary operation on leaf values, combined pointwise over two MTBDDs by
/// [apply]. Operators are plain values and may carry their own state; an
/// operator that returns a cache tag participates in the computed table and
/// must be a pure function of its operands, identical for every instance
/// with the same tag. Stateful operators must leave the tag at None.
pub trait ApplyOp<L>
{
    fn apply(&mut self, lhs: &L, rhs: &L) -> L;

    fn cache_tag(&self) -> Option<u64>
    {
        None
    }
}

/// A unary operation on leaf values, combined pointwise by [apply_monadic].
pub trait MonadicOp<L>
{
    fn apply(&mut self, value: &L) -> L;

    fn cache_tag(&self) -> Option<u64>
    {
        None
    }
}

/// Returns the MTBDD representing `x -> op(lhs(x), rhs(x))`.
///
/// The recursion descends on the smaller of the two top variables; an
/// operand that does not decide the current variable is independent of it
/// and both its cofactors are the operand itself. Once both sides reach a
/// terminal the operator combines the leaf values.
pub fn apply<L, O>(storage: &mut Storage<L>, operator: &mut O, lhs: &Mtbdd, rhs: &Mtbdd) -> Mtbdd
where
    L: Clone + Eq + Hash,
    O: ApplyOp<L>,
{
    if storage.is_leaf(lhs) && storage.is_leaf(rhs)
    {
        let value = operator.apply(storage.value(lhs), storage.value(rhs));
        return storage.constant(value);
    }

    if let Some(tag) = operator.cache_tag()
    {
        if let Some(result) = storage.cached_binary(tag, lhs, rhs)
        {
            return result;
        }
    }

    let var = match (storage.top_var(lhs), storage.top_var(rhs))
    {
        (Some(f), Some(g)) => f.min(g),
        (Some(f), None) => f,
        (None, Some(g)) => g,
        (None, None) => unreachable!("both operands are terminals"),
    };

    let (lhs_low, lhs_high) = cofactors(storage, lhs, var);
    let (rhs_low, rhs_high) = cofactors(storage, rhs, var);

    let low = apply(storage, operator, &lhs_low, &rhs_low);
    let high = apply(storage, operator, &lhs_high, &rhs_high);
    let result = storage.insert(var, &low, &high);

    if let Some(tag) = operator.cache_tag()
    {
        storage.cache_binary(tag, lhs, rhs, &result);
    }

    result
}

/// The two cofactors of `f` for the given variable. An operand that does
/// not decide `var` is independent of it, so both cofactors are the
/// operand itself.
fn cofactors<L>(storage: &Storage<L>, f: &Mtbdd, var: Variable) -> (Mtbdd, Mtbdd)
where
    L: Clone + Eq + Hash,
{
    if storage.top_var(f) == Some(var)
    {
        (storage.low(f), storage.high(f))
    }
    else
    {
        (f.clone(), f.clone())
    }
}

/// Returns the MTBDD representing `x -> op(f(x))`.
pub fn apply_monadic<L, O>(storage: &mut Storage<L>, operator: &mut O, f: &Mtbdd) -> Mtbdd
where
    L: Clone + Eq + Hash,
    O: MonadicOp<L>,
{
    if storage.is_leaf(f)
    {
        let value = operator.apply(storage.value(f));
        return storage.constant(value);
    }

    if let Some(tag) = operator.cache_tag()
    {
        if let Some(result) = storage.cached_monadic(tag, f)
        {
            return result;
        }
    }

    let var = storage.var(f);
    let f_low = storage.low(f);
    let f_high = storage.high(f);

    let low = apply_monadic(storage, operator, &f_low);
    let high = apply_monadic(storage, operator, &f_high);
    let result = storage.insert(var, &low, &high);

    if let Some(tag) = operator.cache_tag()
    {
        storage.cache_monadic(tag, f, &result);
    }

    result
}

/// Abstracts the given variables from `f`, combining the two cofactors of
/// every abstracted variable with `combine`. The combiner must be
/// commutative and associative; with set union this is existential
/// abstraction. The variables must be sorted.
pub fn project<L, O>(storage: &mut Storage<L>, combine: &mut O, f: &Mtbdd, vars: &[Variable]) -> Mtbdd
where
    L: Clone + Eq + Hash,
    O: ApplyOp<L>,
{
    debug_assert!(vars.windows(2).all(|pair| pair[0] < pair[1]), "variables should be sorted");

    let mut visited = FxHashMap::default();
    project_rec(storage, combine, f, vars, &mut visited)
}

fn project_rec<L, O>(
    storage: &mut Storage<L>,
    combine: &mut O,
    f: &Mtbdd,
    vars: &[Variable],
    visited: &mut FxHashMap<usize, Mtbdd>,
) -> Mtbdd
where
    L: Clone + Eq + Hash,
    O: ApplyOp<L>,
{
    if storage.is_leaf(f)
    {
        return f.clone();
    }

    if let Some(result) = visited.get(&f.index())
    {
        return result.clone();
    }

    let var = storage.var(f);
    let f_low = storage.low(f);
    let f_high = storage.high(f);

    let low = project_rec(storage, combine, &f_low, vars, visited);
    let high = project_rec(storage, combine, &f_high, vars, visited);

    let result = if vars.binary_search(&var).is_ok()
    {
        apply(storage, combine, &low, &high)
    }
    else
    {
        storage.insert(var, &low, &high)
    };

    visited.insert(f.index(), result.clone());
    result
}

/// Returns the MTBDD that yields `value` on every minterm of the cube and
/// the background everywhere else. The universal cube therefore produces
/// the constant `value`.
pub fn cube<L>(storage: &mut Storage<L>, cube: &Cube, value: L) -> Mtbdd
where
    L: Clone + Eq + Hash,
{
    let background = storage.background_root();
    let mut root = storage.constant(value);

    // Build the chain bottom-up so the variable order holds by construction.
    for position in (0..cube.width()).rev()
    {
        let var = position as Variable;
        match cube.bit(var)
        {
            Bit::Any => (),
            Bit::One => root = storage.insert(var, &background, &root),
            Bit::Zero => root = storage.insert(var, &root, &background),
        }
    }

    root
}

/// The MTBDD that yields `one` when the variable is true and the background
/// otherwise.
pub fn ith_var<L>(storage: &mut Storage<L>, var: Variable, one: L) -> Mtbdd
where
    L: Clone + Eq + Hash,
{
    let background = storage.background_root();
    let high = storage.constant(one);
    storage.insert(var, &background, &high)
}

/// Evaluates `f` under the given full assignment.
pub fn evaluate<L>(storage: &Storage<L>, f: &Mtbdd, minterm: &[bool]) -> L
where
    L: Clone + Eq + Hash,
{
    let mut current = f.clone();
    while !storage.is_leaf(&current)
    {
        let var = storage.var(&current) as usize;
        debug_assert!(var < minterm.len(), "assignment is too short");
        current = if minterm[var] { storage.high(&current) } else { storage.low(&current) };
    }

    storage.value(&current).clone()
}
