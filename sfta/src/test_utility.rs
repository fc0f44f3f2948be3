use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;

use crate::automaton::{TransitionTable, TreeAutomaton};
use crate::inclusion::SimulationRelation;
use crate::leaves::State;

// These functions are only relevant for testing purposes.

/// Returns a shared transition table wide enough for the random alphabet.
pub fn new_table() -> Rc<RefCell<TransitionTable>>
{
    TransitionTable::shared(4)
}

/// Returns a random automaton over the alphabet a:0, g:1, f:2 with the
/// given number of states and transitions. The automaton always has a
/// nullary rule and at least one initial state, so its language is a
/// non-trivial subject for the inclusion checks.
pub fn random_automaton(
    table: &Rc<RefCell<TransitionTable>>,
    prefix: &str,
    states: usize,
    rules: usize,
) -> TreeAutomaton
{
    let mut rng = rand::thread_rng();

    let mut automaton = TreeAutomaton::new(table);
    automaton.set_name(prefix);

    let mut ids: Vec<State> = Vec::new();
    for index in 0..states
    {
        ids.push(automaton.add_state(&format!("{}{}", prefix, index)));
    }

    let leaf_parent = ids[rng.gen_range(0..ids.len())];
    automaton.add_transition("a", &[], &[leaf_parent]);

    for _ in 0..rules
    {
        let arity = rng.gen_range(0..3);
        let symbol = match arity
        {
            0 => "a",
            1 => "g",
            _ => "f",
        };

        let children: Vec<State> =
            (0..arity).map(|_| ids[rng.gen_range(0..ids.len())]).collect();
        let parent = ids[rng.gen_range(0..ids.len())];
        automaton.add_transition(symbol, &children, &[parent]);
    }

    automaton.set_initial(leaf_parent);
    automaton.set_initial(ids[rng.gen_range(0..ids.len())]);
    automaton
}

/// The identity simulation preorder of the given automaton.
pub fn identity_simulation(automaton: &TreeAutomaton) -> SimulationRelation
{
    SimulationRelation::identity(automaton.states())
}
