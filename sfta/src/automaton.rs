use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::cube::Cube;
use crate::iterators::paths;
use crate::leaves::{ElemOrTuple, State, TupleSet};
use crate::operations::{apply, cube, ApplyOp};
use crate::storage::{Mtbdd, Storage};
use crate::symbol::Alphabet;

// Computed-table tags of the pure leaf operators below.
const UNION_TAG: u64 = 1;
const OVERWRITE_TAG: u64 = 2;

/// Pointwise union of tuple-set leaves.
pub struct TupleSetUnion;

impl ApplyOp<TupleSet> for TupleSetUnion
{
    fn apply(&mut self, lhs: &TupleSet, rhs: &TupleSet) -> TupleSet
    {
        lhs.union(rhs)
    }

    fn cache_tag(&self) -> Option<u64>
    {
        Some(UNION_TAG)
    }
}

/// Keeps the right leaf wherever it is non-empty and the left leaf
/// elsewhere. Combined with a cube MTBDD this rewrites a root on exactly
/// the minterms of the cube.
pub struct Overwrite;

impl ApplyOp<TupleSet> for Overwrite
{
    fn apply(&mut self, current: &TupleSet, update: &TupleSet) -> TupleSet
    {
        if update.is_empty()
        {
            current.clone()
        }
        else
        {
            update.clone()
        }
    }

    fn cache_tag(&self) -> Option<u64>
    {
        Some(OVERWRITE_TAG)
    }
}

/// Product of two tuple-set leaves: every pair of equally long tuples is
/// zipped into the tuple of their product states.
struct TupleProduct<'a>
{
    pairs: &'a FxHashMap<(State, State), State>,
}

impl ApplyOp<TupleSet> for TupleProduct<'_>
{
    fn apply(&mut self, lhs: &TupleSet, rhs: &TupleSet) -> TupleSet
    {
        let mut result = TupleSet::new();
        for left in lhs.iter()
        {
            for right in rhs.iter()
            {
                let left_tuple = left.tuple();
                let right_tuple = right.tuple();
                if left_tuple.len() != right_tuple.len()
                {
                    continue;
                }

                let product: Vec<State> = left_tuple
                    .iter()
                    .zip(right_tuple.iter())
                    .map(|(p, q)| self.pairs[&(*p, *q)])
                    .collect();
                result.insert(ElemOrTuple::Tuple(product));
            }
        }

        result
    }
}

/// Proof of registration with a transition table; required to allocate
/// states.
pub struct RegistrationToken(usize);

/// The shared transition table: the MTBDD storage, the alphabet, and the
/// state allocator that all automata of one engine have in common. Automata
/// register on construction and unregister when dropped; state identifiers
/// are dense and never reused, so unions of automata of the same table are
/// collision-free by construction.
pub struct TransitionTable
{
    storage: Storage<TupleSet>,
    alphabet: Alphabet,
    next_state: State,
    next_token: usize,
    registered: usize,
}

impl TransitionTable
{
    /// Creates a table whose symbols are encoded in `width` Boolean
    /// variables.
    pub fn new(width: usize) -> TransitionTable
    {
        let mut storage = Storage::new(TupleSet::new());
        for _ in 0..width
        {
            storage.create_variable();
        }

        TransitionTable {
            storage,
            alphabet: Alphabet::new(width),
            next_state: 0,
            next_token: 0,
            registered: 0,
        }
    }

    /// Convenience constructor for the usual shared-ownership setup.
    pub fn shared(width: usize) -> Rc<RefCell<TransitionTable>>
    {
        Rc::new(RefCell::new(TransitionTable::new(width)))
    }

    pub fn storage(&self) -> &Storage<TupleSet>
    {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage<TupleSet>
    {
        &mut self.storage
    }

    pub fn alphabet(&self) -> &Alphabet
    {
        &self.alphabet
    }

    pub fn alphabet_mut(&mut self) -> &mut Alphabet
    {
        &mut self.alphabet
    }

    pub fn register_automaton(&mut self) -> RegistrationToken
    {
        let token = RegistrationToken(self.next_token);
        self.next_token += 1;
        self.registered += 1;
        token
    }

    pub fn unregister_automaton(&mut self, token: &RegistrationToken)
    {
        debug_assert!(token.0 < self.next_token, "unknown registration token");
        self.registered -= 1;
    }

    /// The number of automata currently registered.
    pub fn registered_automata(&self) -> usize
    {
        self.registered
    }

    pub fn allocate_state(&mut self, token: &RegistrationToken) -> State
    {
        debug_assert!(token.0 < self.next_token, "unknown registration token");

        let state = self.next_state;
        self.next_state += 1;
        state
    }
}

/// One transition in the top-down reading: reading `symbol` from `parent`
/// may continue into the `children` tuple.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transition
{
    pub symbol: String,
    pub children: Vec<State>,
    pub parent: State,
}

/// A nondeterministic top-down tree automaton. Every state owns one MTBDD
/// root mapping symbols to the set of child tuples reachable under them;
/// the roots live in the shared transition table's storage.
pub struct TreeAutomaton
{
    name: String,
    states: Vec<State>, // Ascending.
    initial: BTreeSet<State>,
    roots: FxHashMap<State, Mtbdd>,
    labels: FxHashMap<String, State>,
    names: FxHashMap<State, String>,
    token: RegistrationToken,
    // Kept last so the root handles above release their protections before
    // the automaton gives up its share of the table.
    table: Rc<RefCell<TransitionTable>>,
}

impl std::fmt::Debug for TreeAutomaton
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("TreeAutomaton")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("initial", &self.initial)
            .finish()
    }
}

impl TreeAutomaton
{
    pub fn new(table: &Rc<RefCell<TransitionTable>>) -> TreeAutomaton
    {
        let token = table.borrow_mut().register_automaton();

        TreeAutomaton {
            name: String::from("A"),
            states: Vec::new(),
            initial: BTreeSet::new(),
            roots: FxHashMap::default(),
            labels: FxHashMap::default(),
            names: FxHashMap::default(),
            token,
            table: Rc::clone(table),
        }
    }

    pub fn table(&self) -> &Rc<RefCell<TransitionTable>>
    {
        &self.table
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn set_name(&mut self, name: &str)
    {
        self.name = name.to_string();
    }

    /// Allocates a state and records its label.
    pub fn add_state(&mut self, label: &str) -> State
    {
        assert!(!self.labels.contains_key(label), "duplicate state label {}", label);

        let state = self.table.borrow_mut().allocate_state(&self.token);
        self.states.push(state);
        self.labels.insert(label.to_string(), state);
        self.names.insert(state, label.to_string());
        state
    }

    pub fn states(&self) -> &[State]
    {
        &self.states
    }

    pub fn state_of(&self, label: &str) -> Option<State>
    {
        self.labels.get(label).copied()
    }

    pub fn label_of(&self, state: State) -> String
    {
        match self.names.get(&state)
        {
            Some(label) => label.clone(),
            None => format!("s{}", state),
        }
    }

    pub fn set_initial(&mut self, state: State)
    {
        assert!(self.owns(state), "state {} belongs to another automaton", state);
        self.initial.insert(state);
    }

    pub fn is_initial(&self, state: State) -> bool
    {
        self.initial.contains(&state)
    }

    /// The initial (root) states, ascending.
    pub fn initial_states(&self) -> Vec<State>
    {
        self.initial.iter().copied().collect()
    }

    /// The transition MTBDD of the given state; the background constant if
    /// the state has no transitions yet.
    pub fn root(&self, state: State) -> Mtbdd
    {
        match self.roots.get(&state)
        {
            Some(root) => root.clone(),
            None => self.table.borrow().storage().background_root(),
        }
    }

    /// Adds the rule `symbol(children) -> parent` for every parent in the
    /// set: the tuple of children is union-inserted at the symbol's cube on
    /// every parent's root. The symbol is registered in the alphabet on
    /// first use.
    pub fn add_transition(&mut self, symbol: &str, children: &[State], parents: &[State])
    {
        assert!(!parents.is_empty(), "a transition needs at least one parent state");
        for state in children.iter().chain(parents.iter())
        {
            assert!(self.owns(*state), "state {} belongs to another automaton", state);
        }

        let mut table = self.table.borrow_mut();
        let code = table.alphabet_mut().insert(symbol, children.len());
        let symbol_cube = table.alphabet().encode(code);

        let storage = table.storage_mut();
        let entry = TupleSet::singleton(ElemOrTuple::Tuple(children.to_vec()));
        let delta = cube(storage, &symbol_cube, entry);

        let mut union = TupleSetUnion;
        for parent in parents
        {
            let root = match self.roots.get(parent)
            {
                Some(root) => root.clone(),
                None => storage.background_root(),
            };
            let updated = apply(storage, &mut union, &root, &delta);
            self.roots.insert(*parent, updated);
        }
    }

    /// Overwrites the leaf of `state` on every minterm of the cube. The
    /// universal cube rewrites the whole symbol space. The value must be
    /// non-empty, since the empty set is indistinguishable from "leave the
    /// old leaf in place".
    pub fn set_symbol(&mut self, state: State, symbol_cube: &Cube, value: TupleSet)
    {
        assert!(self.owns(state), "state {} belongs to another automaton", state);
        assert!(!value.is_empty(), "cannot overwrite with the empty set");

        let mut table = self.table.borrow_mut();
        let storage = table.storage_mut();

        let mask = cube(storage, symbol_cube, value);
        let root = match self.roots.get(&state)
        {
            Some(root) => root.clone(),
            None => storage.background_root(),
        };

        let updated = apply(storage, &mut Overwrite, &root, &mask);
        self.roots.insert(state, updated);
    }

    /// Enumerates all transitions by walking every state's root and
    /// expanding the minterms of every path with a non-empty leaf.
    pub fn transitions(&self) -> Vec<Transition>
    {
        let table = self.table.borrow();
        let width = table.alphabet().width();
        let storage = table.storage();

        let mut result = Vec::new();
        for state in &self.states
        {
            let root = match self.roots.get(state)
            {
                Some(root) => root,
                None => continue,
            };

            for (path_cube, leaf) in paths(storage, root, width)
            {
                if leaf.is_empty()
                {
                    continue;
                }

                for minterm in path_cube.minterms()
                {
                    let symbol = table.alphabet().decode(&minterm);
                    let name = table.alphabet().name(symbol);

                    for entry in leaf.iter()
                    {
                        result.push(Transition {
                            symbol: name.to_string(),
                            children: entry.tuple().to_vec(),
                            parent: *state,
                        });
                    }
                }
            }
        }

        result
    }

    /// Language union: the merged automaton shares both operands' roots.
    /// State identifiers never collide because the shared table allocates
    /// them densely; colliding labels of the second operand are re-labelled.
    pub fn union(&self, other: &TreeAutomaton) -> TreeAutomaton
    {
        assert!(
            Rc::ptr_eq(&self.table, &other.table),
            "automata are registered with different transition tables"
        );

        let mut result = TreeAutomaton::new(&self.table);
        result.set_name(&format!("{}+{}", self.name, other.name));

        for source in [self, other]
        {
            for state in &source.states
            {
                result.states.push(*state);
                result.adopt_label(*state, &source.label_of(*state));
            }
            for state in &source.initial
            {
                result.initial.insert(*state);
            }
            for (state, root) in &source.roots
            {
                result.roots.insert(*state, root.clone());
            }
        }

        result.states.sort_unstable();
        result
    }

    /// Language intersection by the product construction: one fresh state
    /// per pair of operand states, and every pair of equally long child
    /// tuples zipped into a product tuple.
    pub fn intersection(&self, other: &TreeAutomaton) -> TreeAutomaton
    {
        assert!(
            Rc::ptr_eq(&self.table, &other.table),
            "automata are registered with different transition tables"
        );

        let mut result = TreeAutomaton::new(&self.table);
        result.set_name(&format!("{}&{}", self.name, other.name));

        let mut pairs: FxHashMap<(State, State), State> = FxHashMap::default();
        for p in &self.states
        {
            for q in &other.states
            {
                let label = format!("({},{})", self.label_of(*p), other.label_of(*q));
                let product = result.add_state(&label);
                pairs.insert((*p, *q), product);

                if self.is_initial(*p) && other.is_initial(*q)
                {
                    result.initial.insert(product);
                }
            }
        }

        let mut operator = TupleProduct { pairs: &pairs };
        let mut products = Vec::new();
        {
            let mut table = self.table.borrow_mut();
            let storage = table.storage_mut();

            for ((p, q), product) in &pairs
            {
                let left = match self.roots.get(p)
                {
                    Some(root) => root.clone(),
                    None => storage.background_root(),
                };
                let right = match other.roots.get(q)
                {
                    Some(root) => root.clone(),
                    None => storage.background_root(),
                };

                let root = apply(storage, &mut operator, &left, &right);
                products.push((*product, root));
            }
        }

        for (product, root) in products
        {
            result.roots.insert(product, root);
        }
        result
    }

    fn owns(&self, state: State) -> bool
    {
        self.states.binary_search(&state).is_ok()
    }

    fn adopt_label(&mut self, state: State, label: &str)
    {
        let mut candidate = label.to_string();
        while self.labels.contains_key(&candidate)
        {
            candidate = format!("{}_{}", candidate, state);
        }

        self.labels.insert(candidate.clone(), state);
        self.names.insert(state, candidate);
    }
}

impl Drop for TreeAutomaton
{
    fn drop(&mut self)
    {
        self.table.borrow_mut().unregister_automaton(&self.token);
    }
}
