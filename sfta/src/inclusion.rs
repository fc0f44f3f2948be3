use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::automaton::{TreeAutomaton, TupleSetUnion};
use crate::leaves::{ElemOrTuple, State, TupleSet};
use crate::operations::{apply, ApplyOp};

/// A sorted set of states, the right-hand side of a disjunct.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StateSet
{
    states: Vec<State>, // Sorted and free of duplicates.
}

impl StateSet
{
    pub fn new() -> StateSet
    {
        StateSet { states: Vec::new() }
    }

    pub fn singleton(state: State) -> StateSet
    {
        StateSet { states: vec![state] }
    }

    pub fn from_states(mut states: Vec<State>) -> StateSet
    {
        states.sort_unstable();
        states.dedup();
        StateSet { states }
    }

    pub fn insert(&mut self, state: State)
    {
        if let Err(position) = self.states.binary_search(&state)
        {
            self.states.insert(position, state);
        }
    }

    pub fn contains(&self, state: State) -> bool
    {
        self.states.binary_search(&state).is_ok()
    }

    pub fn states(&self) -> &[State]
    {
        &self.states
    }

    pub fn iter(&self) -> std::slice::Iter<'_, State>
    {
        self.states.iter()
    }

    pub fn len(&self) -> usize
    {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.states.is_empty()
    }
}

/// A simulation preorder over the states of one automaton, consumed by the
/// inclusion check as an input. The relation is kept as the simulator sets
/// of every state; it must be reflexive, which the constructors maintain.
pub struct SimulationRelation
{
    simulators: FxHashMap<State, StateSet>,
}

impl SimulationRelation
{
    /// The identity preorder over the given states.
    pub fn identity(states: &[State]) -> SimulationRelation
    {
        let mut simulators = FxHashMap::default();
        for state in states
        {
            simulators.insert(*state, StateSet::singleton(*state));
        }

        SimulationRelation { simulators }
    }

    /// Records that `simulated` is simulated by `simulator`.
    pub fn add(&mut self, simulated: State, simulator: State)
    {
        self.simulators
            .entry(simulated)
            .or_insert_with(|| StateSet::singleton(simulated))
            .insert(simulator);
    }

    /// The sorted set of states simulating the given state.
    pub fn simulators(&self, state: State) -> &StateSet
    {
        match self.simulators.get(&state)
        {
            Some(simulators) => simulators,
            None => panic!("state {} is unknown to the simulation relation", state),
        }
    }
}

/// A disjunct (p, S): every tree accepted from p in the smaller automaton
/// is accepted from some state of S in the bigger one.
pub type Disjunct = (State, StateSet);

/// Counters of the antichain search, exposed for tests and diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct InclusionStats
{
    pub expanded_disjuncts: usize,
}

/// Decides whether the language of `smaller` is included in the language of
/// `bigger`. Both automata must be registered with the same transition
/// table; the two simulation preorders over their respective state sets are
/// used to subsume disjuncts and prune the antichain.
pub fn check_inclusion(
    smaller: &TreeAutomaton,
    bigger: &TreeAutomaton,
    sim_smaller: &SimulationRelation,
    sim_bigger: &SimulationRelation,
) -> bool
{
    check_inclusion_with_stats(smaller, bigger, sim_smaller, sim_bigger).0
}

/// As [check_inclusion], additionally reporting how many disjuncts the
/// search expanded.
pub fn check_inclusion_with_stats(
    smaller: &TreeAutomaton,
    bigger: &TreeAutomaton,
    sim_smaller: &SimulationRelation,
    sim_bigger: &SimulationRelation,
) -> (bool, InclusionStats)
{
    assert!(
        Rc::ptr_eq(smaller.table(), bigger.table()),
        "automata are registered with different transition tables"
    );

    let mut checker = InclusionChecker {
        smaller,
        bigger,
        sim_smaller,
        sim_bigger,
        workset: FxHashMap::default(),
        included: FxHashMap::default(),
        nonincluded: FxHashMap::default(),
        expanded: 0,
    };

    let holds = checker.run();
    (holds, InclusionStats { expanded_disjuncts: checker.expanded })
}

/// Returns true iff every state of `smaller` has a simulator inside
/// `bigger`; both sets are sorted, so the intersection test is a merge.
fn forall_exists(smaller: &StateSet, bigger: &StateSet, sim: &SimulationRelation) -> bool
{
    'outer: for state in smaller.iter()
    {
        let simulators = sim.simulators(*state).states();
        let bigger = bigger.states();

        let (mut i, mut j) = (0, 0);
        while i < simulators.len() && j < bigger.len()
        {
            match simulators[i].cmp(&bigger[j])
            {
                std::cmp::Ordering::Equal => continue 'outer,
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }

        return false;
    }

    true
}

struct InclusionChecker<'a>
{
    smaller: &'a TreeAutomaton,
    bigger: &'a TreeAutomaton,
    sim_smaller: &'a SimulationRelation,
    sim_bigger: &'a SimulationRelation,

    // Antichains of bigger-state sets, keyed by the smaller state.
    workset: FxHashMap<State, Vec<StateSet>>,
    included: FxHashMap<State, Vec<StateSet>>,
    nonincluded: FxHashMap<State, Vec<StateSet>>,

    expanded: usize,
}

impl InclusionChecker<'_>
{
    fn run(&mut self) -> bool
    {
        let bigger_initial = StateSet::from_states(self.bigger.initial_states());

        for state in self.smaller.initial_states()
        {
            if !self.expand_subset(&(state, bigger_initial.clone()))
            {
                return false;
            }
        }

        true
    }

    /// A cached included pair (p, S') implies (p, S) whenever S' is
    /// simulated into S.
    fn is_inclusion_cached(&self, disjunct: &Disjunct) -> bool
    {
        match self.included.get(&disjunct.0)
        {
            None => false,
            Some(entries) => entries
                .iter()
                .any(|cached| forall_exists(cached, &disjunct.1, self.sim_bigger)),
        }
    }

    /// A cached non-included pair (p, S') refutes (p, S) whenever S is
    /// simulated into S'.
    fn is_noninclusion_cached(&self, disjunct: &Disjunct) -> bool
    {
        match self.nonincluded.get(&disjunct.0)
        {
            None => false,
            Some(entries) => entries
                .iter()
                .any(|cached| forall_exists(&disjunct.1, cached, self.sim_bigger)),
        }
    }

    /// The co-inductive cut: a disjunct already on the workset subsumes the
    /// current one under the same condition as the inclusion cache.
    fn is_implied_by_workset(&self, disjunct: &Disjunct) -> bool
    {
        match self.workset.get(&disjunct.0)
        {
            None => false,
            Some(entries) => entries
                .iter()
                .any(|pending| forall_exists(pending, &disjunct.1, self.sim_bigger)),
        }
    }

    /// A queued sibling (p', S') subsumes (p, S) when p' is simulated by p
    /// and S is simulated into S': then (p, S) implies (p', S'), so
    /// checking the sibling suffices for the disjunction.
    fn is_implied_by_children(&self, children: &[Disjunct], disjunct: &Disjunct) -> bool
    {
        children.iter().any(|child| {
            self.sim_smaller.simulators(child.0).contains(disjunct.0)
                && forall_exists(&disjunct.1, &child.1, self.sim_bigger)
        })
    }

    fn add_to_workset(&mut self, disjunct: &Disjunct)
    {
        self.workset.entry(disjunct.0).or_default().push(disjunct.1.clone());
    }

    fn remove_from_workset(&mut self, disjunct: &Disjunct)
    {
        let entries = match self.workset.get_mut(&disjunct.0)
        {
            Some(entries) => entries,
            None => panic!("an attempt to remove a state missing from the workset"),
        };

        match entries.iter().position(|pending| *pending == disjunct.1)
        {
            Some(position) =>
            {
                entries.remove(position);
            }
            None => panic!("an attempt to remove a state set missing from the workset"),
        }
    }

    /// Caches (p, S) as included, keeping only the subsumption-minimal sets.
    fn cache_inclusion(&mut self, disjunct: &Disjunct)
    {
        let sim = self.sim_bigger;
        let entries = self.included.entry(disjunct.0).or_default();

        if entries.iter().any(|cached| forall_exists(cached, &disjunct.1, sim))
        {
            return;
        }

        entries.retain(|cached| !forall_exists(&disjunct.1, cached, sim));
        entries.push(disjunct.1.clone());
    }

    /// Caches (p, S) as non-included, keeping only the maximal sets.
    fn cache_noninclusion(&mut self, disjunct: &Disjunct)
    {
        let sim = self.sim_bigger;
        let entries = self.nonincluded.entry(disjunct.0).or_default();

        if entries.iter().any(|cached| forall_exists(&disjunct.1, cached, sim))
        {
            return;
        }

        entries.retain(|cached| !forall_exists(cached, &disjunct.1, sim));
        entries.push(disjunct.1.clone());
    }

    /// A disjunction holds iff at least one of its disjuncts holds.
    fn expand_disjunction(&mut self, disjunction: &[Disjunct]) -> bool
    {
        debug!("expanding disjunction {:?}", disjunction);

        let mut children: Vec<Disjunct> = Vec::new();
        for disjunct in disjunction
        {
            if self.is_inclusion_cached(disjunct)
            {
                debug!("disjunct {:?} inclusion cached", disjunct);
                return true;
            }
            if self.is_noninclusion_cached(disjunct)
            {
                debug!("disjunct {:?} noninclusion cached", disjunct);
                continue;
            }
            if self.is_implied_by_workset(disjunct)
            {
                debug!("disjunct {:?} implied by workset", disjunct);
                return true;
            }
            if self.is_implied_by_children(&children, disjunct)
            {
                continue;
            }

            children.push(disjunct.clone());
        }

        for child in children
        {
            if self.expand_subset(&child)
            {
                self.cache_inclusion(&child);
                return true;
            }

            self.cache_noninclusion(&child);
        }

        false
    }

    /// Expands the disjunct (p, S): collects, per symbol and choice
    /// function, the disjunctions the pair reduces to, and checks them all
    /// recursively with (p, S) on the workset.
    fn expand_subset(&mut self, disjunct: &Disjunct) -> bool
    {
        debug!("expanding disjunct ({}, {:?})", disjunct.0, disjunct.1);
        self.expanded += 1;

        // Fetch the root handles before borrowing the shared table.
        let smaller_root = self.smaller.root(disjunct.0);
        let bigger_roots: Vec<_> = disjunct.1.iter().map(|state| self.bigger.root(*state)).collect();

        let mut collector = ChildrenCollector::new();
        {
            let mut table = self.smaller.table().borrow_mut();
            let storage = table.storage_mut();

            let mut union_root = storage.background_root();
            let mut union = TupleSetUnion;
            for root in &bigger_roots
            {
                union_root = apply(storage, &mut union, &union_root, root);
            }

            apply(storage, &mut collector, &smaller_root, &union_root);
        }

        if !collector.holds
        {
            return false;
        }

        self.add_to_workset(disjunct);

        while let Some(disjunction) = collector.queue.pop_front()
        {
            if !self.expand_disjunction(&disjunction)
            {
                self.remove_from_workset(disjunct);
                return false;
            }
        }

        self.remove_from_workset(disjunct);
        true
    }
}

/// The apply functor of the inclusion check. For every symbol region it
/// receives the smaller state's leaf and the union of the bigger set's
/// leaves, and queues the disjunctions the pair gives rise to; a nullary
/// smaller transition with no nullary counterpart fails the check
/// immediately. The functor only collects, so it always returns the empty
/// set.
struct ChildrenCollector
{
    queue: VecDeque<Vec<Disjunct>>,
    holds: bool,
}

impl ChildrenCollector
{
    fn new() -> ChildrenCollector
    {
        ChildrenCollector { queue: VecDeque::new(), holds: true }
    }
}

impl ApplyOp<TupleSet> for ChildrenCollector
{
    fn apply(&mut self, lhs: &TupleSet, rhs: &TupleSet) -> TupleSet
    {
        if !self.holds || lhs.is_empty()
        {
            // Pointless to compute anything further.
            return TupleSet::new();
        }

        debug_assert!(
            lhs.iter().chain(rhs.iter()).all(|entry| !entry.is_element()),
            "transition leaves hold child tuples, not plain states"
        );

        let arity = match lhs.iter().next()
        {
            Some(entry) => entry.tuple().len(),
            None => unreachable!("the smaller leaf is non-empty"),
        };
        assert!(
            lhs.iter().all(|entry| entry.tuple().len() == arity),
            "smaller leaf mixes arities"
        );

        if arity == 0
        {
            // The smaller state can make a nullary transition here; the
            // bigger set must offer one as well.
            if !rhs.contains(&ElemOrTuple::Tuple(Vec::new()))
            {
                debug!("nullary transition has no counterpart");
                self.holds = false;
            }
            return TupleSet::new();
        }

        let rhs_tuples: Vec<&[State]> = rhs.iter().map(|entry| entry.tuple()).collect();

        for choice in ChoiceFunctions::new(rhs_tuples.len(), arity)
        {
            for entry in lhs.iter()
            {
                let tuple = entry.tuple();
                let mut disjunction = Vec::new();

                for position in 0..arity
                {
                    // The states offered for this tuple position form a set
                    // of single states, carried as element leaves.
                    let mut part = TupleSet::new();
                    for (which, assigned) in choice.iter().enumerate()
                    {
                        if *assigned == position
                        {
                            part.insert(ElemOrTuple::Elem(rhs_tuples[which][position]));
                        }
                    }

                    if !part.is_empty()
                    {
                        let states = StateSet::from_states(
                            part.iter().map(|entry| entry.element()).collect(),
                        );
                        disjunction.push((tuple[position], states));
                    }
                }

                self.queue.push_back(disjunction);
            }
        }

        TupleSet::new()
    }
}

/// Enumerates all functions from `elements` positions into `buckets`
/// values as index vectors, in lexicographic order: the first position is
/// incremented first and overflow carries rightwards. Exactly
/// `buckets ^ elements` vectors are produced; zero elements yield the
/// single empty vector.
pub struct ChoiceFunctions
{
    current: Option<Vec<usize>>,
    buckets: usize,
}

impl ChoiceFunctions
{
    pub fn new(elements: usize, buckets: usize) -> ChoiceFunctions
    {
        let current = if buckets == 0 && elements > 0
        {
            None
        }
        else
        {
            Some(vec![0; elements])
        };

        ChoiceFunctions { current, buckets }
    }
}

impl Iterator for ChoiceFunctions
{
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item>
    {
        let current = self.current.take()?;

        let mut next = current.clone();
        let mut position = 0;
        while position < next.len()
        {
            next[position] += 1;
            if next[position] < self.buckets
            {
                self.current = Some(next);
                return Some(current);
            }

            next[position] = 0;
            position += 1;
        }

        // The carry ran off the end: `current` was the final vector.
        Some(current)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::automaton::{TransitionTable, TreeAutomaton};

    fn identity(automaton: &TreeAutomaton) -> SimulationRelation
    {
        SimulationRelation::identity(automaton.states())
    }

    #[test]
    fn choice_functions_enumerate_lexicographically()
    {
        let all: Vec<Vec<usize>> = ChoiceFunctions::new(2, 2).collect();

        assert_eq!(all, vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]);
    }

    #[test]
    fn choice_functions_count_is_buckets_to_the_elements()
    {
        assert_eq!(ChoiceFunctions::new(3, 3).count(), 27);
        assert_eq!(ChoiceFunctions::new(1, 5).count(), 5);
    }

    #[test]
    fn zero_elements_yield_the_empty_choice()
    {
        let all: Vec<Vec<usize>> = ChoiceFunctions::new(0, 3).collect();

        assert_eq!(all, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn zero_buckets_with_elements_yield_nothing()
    {
        assert_eq!(ChoiceFunctions::new(2, 0).count(), 0);
    }

    #[test]
    fn forall_exists_uses_the_simulators()
    {
        let mut sim = SimulationRelation::identity(&[0, 1, 2]);
        sim.add(0, 2);

        let smaller = StateSet::from_states(vec![0]);
        let bigger = StateSet::from_states(vec![2]);
        assert!(forall_exists(&smaller, &bigger, &sim));

        let unrelated = StateSet::from_states(vec![1]);
        assert!(!forall_exists(&unrelated, &bigger, &sim));
    }

    #[test]
    fn reflexive_inclusion_holds()
    {
        let table = TransitionTable::shared(4);
        let mut automaton = TreeAutomaton::new(&table);

        let q = automaton.add_state("q");
        let r = automaton.add_state("r");
        automaton.add_transition("a", &[], &[q]);
        automaton.add_transition("f", &[q, q], &[r]);
        automaton.set_initial(r);

        let sim = identity(&automaton);
        assert!(check_inclusion(&automaton, &automaton, &sim, &sim));
    }

    #[test]
    fn single_rule_is_covered_by_a_split_pair()
    {
        // S3: the bigger automaton accepts { a } from either initial state.
        let table = TransitionTable::shared(4);

        let mut smaller = TreeAutomaton::new(&table);
        let p = smaller.add_state("p");
        smaller.add_transition("a", &[], &[p]);
        smaller.set_initial(p);

        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        let s = bigger.add_state("s");
        bigger.add_transition("a", &[], &[r, s]);
        bigger.set_initial(r);
        bigger.set_initial(s);

        assert!(check_inclusion(&smaller, &bigger, &identity(&smaller), &identity(&bigger)));
    }

    #[test]
    fn missing_symbol_breaks_inclusion()
    {
        // S4: the smaller automaton also accepts b.
        let table = TransitionTable::shared(4);

        let mut smaller = TreeAutomaton::new(&table);
        let p = smaller.add_state("p");
        smaller.add_transition("a", &[], &[p]);
        smaller.add_transition("b", &[], &[p]);
        smaller.set_initial(p);

        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        bigger.add_transition("a", &[], &[r]);
        bigger.set_initial(r);

        assert!(!check_inclusion(&smaller, &bigger, &identity(&smaller), &identity(&bigger)));
    }

    #[test]
    fn simulation_prunes_the_antichain()
    {
        // S5: the bigger automaton scatters the binary rule over two
        // states; the simulation s below r lets the search subsume the
        // mixed sets early.
        let table = TransitionTable::shared(4);

        let mut smaller = TreeAutomaton::new(&table);
        let p = smaller.add_state("p");
        smaller.add_transition("f", &[p, p], &[p]);
        smaller.add_transition("a", &[], &[p]);
        smaller.set_initial(p);

        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        let s = bigger.add_state("s");
        bigger.add_transition("f", &[r, s], &[r]);
        bigger.add_transition("f", &[s, r], &[r]);
        bigger.add_transition("f", &[r, r], &[r]);
        bigger.add_transition("a", &[], &[r, s]);
        bigger.set_initial(r);

        let sim_smaller = identity(&smaller);
        let mut sim_bigger = identity(&bigger);
        sim_bigger.add(s, r);

        let (holds, with_simulation) =
            check_inclusion_with_stats(&smaller, &bigger, &sim_smaller, &identity(&bigger));
        assert!(holds);

        let (holds, pruned) =
            check_inclusion_with_stats(&smaller, &bigger, &sim_smaller, &sim_bigger);
        assert!(holds);

        // The simulation can only add subsumption opportunities.
        assert!(pruned.expanded_disjuncts <= with_simulation.expanded_disjuncts);
        assert!(pruned.expanded_disjuncts <= 32);
    }

    #[test]
    fn empty_automaton_is_included_in_everything()
    {
        let table = TransitionTable::shared(4);

        let empty = TreeAutomaton::new(&table);

        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        bigger.add_transition("a", &[], &[r]);
        bigger.set_initial(r);

        assert!(check_inclusion(&empty, &bigger, &identity(&empty), &identity(&bigger)));
    }

    #[test]
    fn nullary_transition_needs_a_nullary_counterpart()
    {
        let table = TransitionTable::shared(4);

        let mut smaller = TreeAutomaton::new(&table);
        let p = smaller.add_state("p");
        smaller.add_transition("a", &[], &[p]);
        smaller.set_initial(p);

        // A bigger automaton whose initial state only fires on a unary
        // symbol cannot accept the single-leaf tree.
        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        bigger.add_transition("g", &[r], &[r]);
        bigger.set_initial(r);

        assert!(!check_inclusion(&smaller, &bigger, &identity(&smaller), &identity(&bigger)));

        // With the matching nullary rule present the inclusion holds.
        let mut covered = TreeAutomaton::new(&table);
        let t = covered.add_state("t");
        covered.add_transition("a", &[], &[t]);
        covered.set_initial(t);

        assert!(check_inclusion(&smaller, &covered, &identity(&smaller), &identity(&covered)));
    }

    #[test]
    fn initial_states_must_cover_every_smaller_initial()
    {
        let table = TransitionTable::shared(4);

        let mut smaller = TreeAutomaton::new(&table);
        let p = smaller.add_state("p");
        let q = smaller.add_state("q");
        smaller.add_transition("a", &[], &[p]);
        smaller.add_transition("b", &[], &[q]);
        smaller.set_initial(p);
        smaller.set_initial(q);

        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        bigger.add_transition("a", &[], &[r]);
        bigger.set_initial(r);

        assert!(!check_inclusion(&smaller, &bigger, &identity(&smaller), &identity(&bigger)));
    }

    #[test]
    fn branching_rule_requires_both_components()
    {
        // f(p, p) -> p with a leaf rule on the smaller side; the bigger
        // side only closes one component of the pair.
        let table = TransitionTable::shared(4);

        let mut smaller = TreeAutomaton::new(&table);
        let p = smaller.add_state("p");
        smaller.add_transition("f", &[p, p], &[p]);
        smaller.add_transition("a", &[], &[p]);
        smaller.set_initial(p);

        let mut bigger = TreeAutomaton::new(&table);
        let r = bigger.add_state("r");
        let s = bigger.add_state("s");
        bigger.add_transition("f", &[r, s], &[r]);
        bigger.add_transition("f", &[s, r], &[r]);
        bigger.add_transition("a", &[], &[r, s]);
        bigger.set_initial(r);

        // Trees with two compound children are not covered.
        assert!(!check_inclusion(&smaller, &bigger, &identity(&smaller), &identity(&bigger)));
    }
}
