use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use std::collections::BTreeMap;

use crate::automaton::{TransitionTable, TreeAutomaton};
use crate::leaves::State;

/// An error of the Timbuk reader, with the offending line number.
#[derive(Debug)]
pub struct ParseError
{
    pub line: usize,
    pub message: String,
}

impl ParseError
{
    fn new(line: usize, message: impl Into<String>) -> ParseError
    {
        ParseError { line, message: message.into() }
    }
}

impl fmt::Display for ParseError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl Error for ParseError {}

enum Section
{
    Preamble,
    Ops,
    States,
    FinalStates,
    Transitions,
}

/// Reads a tree automaton in the Timbuk text format:
///
/// ```text
/// Ops a:0 f:2
/// Automaton A
/// States q0 q1
/// Final States q0
/// Transitions
/// a -> q0
/// f(q0,q0) -> q1
/// ```
///
/// The final states of the (bottom-up) Timbuk file become the initial
/// states of the top-down automaton. All symbols must be declared in the
/// `Ops` section before use; states may carry the optional `:0` suffix.
pub fn parse(table: &Rc<RefCell<TransitionTable>>, input: &str) -> Result<TreeAutomaton, ParseError>
{
    let mut automaton = TreeAutomaton::new(table);
    let mut section = Section::Preamble;

    for (number, raw_line) in input.lines().enumerate()
    {
        let number = number + 1;
        let line = raw_line.trim();
        if line.is_empty()
        {
            continue;
        }

        let rest = if let Some(rest) = line.strip_prefix("Ops")
        {
            section = Section::Ops;
            rest
        }
        else if let Some(rest) = line.strip_prefix("Automaton")
        {
            let name = rest.trim();
            if name.is_empty()
            {
                return Err(ParseError::new(number, "missing automaton name"));
            }
            automaton.set_name(name);
            continue;
        }
        else if let Some(rest) = line.strip_prefix("Final States")
        {
            section = Section::FinalStates;
            rest
        }
        else if let Some(rest) = line.strip_prefix("States")
        {
            section = Section::States;
            rest
        }
        else if let Some(rest) = line.strip_prefix("Transitions")
        {
            section = Section::Transitions;
            rest
        }
        else
        {
            line
        };

        match section
        {
            Section::Preamble =>
            {
                return Err(ParseError::new(number, format!("unexpected input {}", line)));
            }
            Section::Ops =>
            {
                for token in rest.split_whitespace()
                {
                    parse_op(table, number, token)?;
                }
            }
            Section::States =>
            {
                for token in rest.split_whitespace()
                {
                    let name = strip_state_suffix(token);
                    if automaton.state_of(name).is_some()
                    {
                        return Err(ParseError::new(number, format!("duplicate state {}", name)));
                    }
                    automaton.add_state(name);
                }
            }
            Section::FinalStates =>
            {
                for token in rest.split_whitespace()
                {
                    let name = strip_state_suffix(token);
                    match automaton.state_of(name)
                    {
                        Some(state) => automaton.set_initial(state),
                        None =>
                        {
                            return Err(ParseError::new(
                                number,
                                format!("unknown final state {}", name),
                            ));
                        }
                    }
                }
            }
            Section::Transitions =>
            {
                parse_rule(table, &mut automaton, number, rest)?;
            }
        }
    }

    Ok(automaton)
}

fn parse_op(
    table: &Rc<RefCell<TransitionTable>>,
    number: usize,
    token: &str,
) -> Result<(), ParseError>
{
    let (name, arity) = match token.split_once(':')
    {
        Some(pair) => pair,
        None => return Err(ParseError::new(number, format!("malformed operator {}", token))),
    };

    let arity: usize = match arity.parse()
    {
        Ok(arity) => arity,
        Err(_) => return Err(ParseError::new(number, format!("malformed arity in {}", token))),
    };

    let mut table = table.borrow_mut();
    if let Some(symbol) = table.alphabet().symbol(name)
    {
        if table.alphabet().arity(symbol) != arity
        {
            return Err(ParseError::new(
                number,
                format!("operator {} redeclared with arity {}", name, arity),
            ));
        }
        return Ok(());
    }

    table.alphabet_mut().insert(name, arity);
    Ok(())
}

fn parse_rule(
    table: &Rc<RefCell<TransitionTable>>,
    automaton: &mut TreeAutomaton,
    number: usize,
    line: &str,
) -> Result<(), ParseError>
{
    let line = line.trim();
    if line.is_empty()
    {
        return Ok(());
    }

    let (lhs, rhs) = match line.split_once("->")
    {
        Some(pair) => pair,
        None => return Err(ParseError::new(number, format!("malformed rule {}", line))),
    };

    let parent = match automaton.state_of(rhs.trim())
    {
        Some(state) => state,
        None =>
        {
            return Err(ParseError::new(number, format!("unknown state {}", rhs.trim())));
        }
    };

    let lhs = lhs.trim();
    let (symbol, children) = match lhs.split_once('(')
    {
        None => (lhs, Vec::new()),
        Some((symbol, arguments)) =>
        {
            let arguments = match arguments.strip_suffix(')')
            {
                Some(arguments) => arguments.trim(),
                None => return Err(ParseError::new(number, format!("unbalanced rule {}", line))),
            };

            let mut children: Vec<State> = Vec::new();
            if !arguments.is_empty()
            {
                for argument in arguments.split(',')
                {
                    match automaton.state_of(argument.trim())
                    {
                        Some(state) => children.push(state),
                        None =>
                        {
                            return Err(ParseError::new(
                                number,
                                format!("unknown state {}", argument.trim()),
                            ));
                        }
                    }
                }
            }

            (symbol.trim(), children)
        }
    };

    let declared = {
        let table = table.borrow();
        match table.alphabet().symbol(symbol)
        {
            Some(code) => Some(table.alphabet().arity(code)),
            None => None,
        }
    };

    match declared
    {
        None =>
        {
            return Err(ParseError::new(number, format!("undeclared operator {}", symbol)));
        }
        Some(arity) if arity != children.len() =>
        {
            return Err(ParseError::new(
                number,
                format!("operator {} used with arity {}", symbol, children.len()),
            ));
        }
        Some(_) => (),
    }

    automaton.add_transition(symbol, &children, &[parent]);
    Ok(())
}

fn strip_state_suffix(token: &str) -> &str
{
    match token.split_once(':')
    {
        Some((name, _)) => name,
        None => token,
    }
}

/// Prints an automaton in the Timbuk format accepted by [parse]. Only the
/// symbols actually occurring in transitions appear in the `Ops` section.
pub fn serialize(automaton: &TreeAutomaton) -> String
{
    let transitions = automaton.transitions();

    let mut operators: BTreeMap<String, usize> = BTreeMap::new();
    for transition in &transitions
    {
        operators.insert(transition.symbol.clone(), transition.children.len());
    }

    let mut out = String::from("Ops");
    for (name, arity) in &operators
    {
        out.push_str(&format!(" {}:{}", name, arity));
    }

    out.push_str(&format!("\n\nAutomaton {}\n\nStates", automaton.name()));
    for state in automaton.states()
    {
        out.push_str(&format!(" {}", automaton.label_of(*state)));
    }

    out.push_str("\n\nFinal States");
    for state in automaton.initial_states()
    {
        out.push_str(&format!(" {}", automaton.label_of(state)));
    }

    out.push_str("\n\nTransitions\n");
    for transition in &transitions
    {
        if transition.children.is_empty()
        {
            out.push_str(&format!(
                "{} -> {}\n",
                transition.symbol,
                automaton.label_of(transition.parent)
            ));
        }
        else
        {
            let children: Vec<String> = transition
                .children
                .iter()
                .map(|child| automaton.label_of(*child))
                .collect();
            out.push_str(&format!(
                "{}({}) -> {}\n",
                transition.symbol,
                children.join(","),
                automaton.label_of(transition.parent)
            ));
        }
    }

    out
}
