use crate::inclusion::check_inclusion;
use crate::test_utility::*;
use crate::timbuk::{parse, serialize};

// Cross-module properties on randomly generated automata. The automata are
// kept small so every inclusion check stays far away from the exponential
// worst case of the choice-function enumeration.

#[test]
fn random_inclusion_is_reflexive()
{
    for _ in 0..10
    {
        let table = new_table();
        let automaton = random_automaton(&table, "q", 3, 5);
        let sim = identity_simulation(&automaton);

        assert!(check_inclusion(&automaton, &automaton, &sim, &sim));
    }
}

#[test]
fn random_union_contains_both_operands()
{
    for _ in 0..10
    {
        let table = new_table();
        let first = random_automaton(&table, "q", 3, 5);
        let second = random_automaton(&table, "r", 3, 5);
        let union = first.union(&second);

        let sim_first = identity_simulation(&first);
        let sim_second = identity_simulation(&second);
        let sim_union = identity_simulation(&union);

        assert!(check_inclusion(&first, &union, &sim_first, &sim_union));
        assert!(check_inclusion(&second, &union, &sim_second, &sim_union));
    }
}

#[test]
fn random_union_decomposes_on_the_left()
{
    for _ in 0..10
    {
        let table = new_table();
        let first = random_automaton(&table, "q", 3, 4);
        let second = random_automaton(&table, "r", 3, 4);
        let third = random_automaton(&table, "s", 3, 4);
        let union = first.union(&second);

        let sim_first = identity_simulation(&first);
        let sim_second = identity_simulation(&second);
        let sim_third = identity_simulation(&third);
        let sim_union = identity_simulation(&union);

        let both = check_inclusion(&first, &third, &sim_first, &sim_third)
            && check_inclusion(&second, &third, &sim_second, &sim_third);
        assert_eq!(check_inclusion(&union, &third, &sim_union, &sim_third), both);
    }
}

#[test]
fn random_inclusion_is_transitive()
{
    for _ in 0..20
    {
        let table = new_table();
        let first = random_automaton(&table, "q", 3, 4);
        let second = random_automaton(&table, "r", 3, 4);
        let third = random_automaton(&table, "s", 3, 4);

        let sim_first = identity_simulation(&first);
        let sim_second = identity_simulation(&second);
        let sim_third = identity_simulation(&third);

        if check_inclusion(&first, &second, &sim_first, &sim_second)
            && check_inclusion(&second, &third, &sim_second, &sim_third)
        {
            assert!(check_inclusion(&first, &third, &sim_first, &sim_third));
        }
    }
}

#[test]
fn random_intersection_is_below_both_operands()
{
    for _ in 0..10
    {
        let table = new_table();
        let first = random_automaton(&table, "q", 2, 4);
        let second = random_automaton(&table, "r", 2, 4);
        let product = first.intersection(&second);

        let sim_first = identity_simulation(&first);
        let sim_second = identity_simulation(&second);
        let sim_product = identity_simulation(&product);

        assert!(check_inclusion(&product, &first, &sim_product, &sim_first));
        assert!(check_inclusion(&product, &second, &sim_product, &sim_second));
    }
}

#[test]
fn random_serialization_preserves_the_language()
{
    for _ in 0..10
    {
        let table = new_table();
        let automaton = random_automaton(&table, "q", 3, 5);

        let printed = serialize(&automaton);
        let reparsed = parse(&table, &printed).unwrap();

        let sim = identity_simulation(&automaton);
        let sim_reparsed = identity_simulation(&reparsed);

        assert!(check_inclusion(&automaton, &reparsed, &sim, &sim_reparsed));
        assert!(check_inclusion(&reparsed, &automaton, &sim_reparsed, &sim));
    }
}

#[test]
fn union_survives_a_timbuk_round_trip()
{
    let table = new_table();

    let first = parse(
        &table,
        "Ops a:0 b:1\nAutomaton A1\nStates q\nFinal States q\nTransitions\na -> q\nb(q) -> q\n",
    )
    .unwrap();
    let second =
        parse(&table, "Ops c:0\nAutomaton A2\nStates r\nFinal States r\nTransitions\nc -> r\n")
            .unwrap();

    let union = first.union(&second);
    assert_eq!(union.states().len(), 2);
    assert_eq!(union.transitions().len(), 3);
    assert_eq!(union.initial_states().len(), 2);

    let reparsed = parse(&table, &serialize(&union)).unwrap();
    let sim_union = identity_simulation(&union);
    let sim_reparsed = identity_simulation(&reparsed);

    assert!(check_inclusion(&union, &reparsed, &sim_union, &sim_reparsed));
    assert!(check_inclusion(&reparsed, &union, &sim_reparsed, &sim_union));
}

#[test]
fn union_with_an_empty_automaton_keeps_the_language()
{
    let table = new_table();
    let automaton = random_automaton(&table, "q", 3, 5);
    let empty = crate::automaton::TreeAutomaton::new(&table);
    let union = automaton.union(&empty);

    let sim = identity_simulation(&automaton);
    let sim_union = identity_simulation(&union);

    assert!(check_inclusion(&automaton, &union, &sim, &sim_union));
    assert!(check_inclusion(&union, &automaton, &sim_union, &sim));
}
