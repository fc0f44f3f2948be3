use std::error::Error;
use std::fs;

use log::info;

use sfta::{check_inclusion, parse, serialize, SimulationRelation, TransitionTable};

/// Symbol width of the shared engine; fits 65536 distinct operators.
const ALPHABET_WIDTH: usize = 16;

pub enum Command
{
    Union,
    Inclusion,
}

pub struct Config
{
    pub command: Command,
    pub left: String,
    pub right: String,
}

impl Config
{
    /// Parses the provided arguments and fills in the configuration.
    pub fn new(mut args: impl Iterator<Item = String>) -> Result<Config, &'static str>
    {
        args.next(); // The first argument is the executable's location.

        let command = match args.next().as_deref()
        {
            Some("union") => Command::Union,
            Some("incl") => Command::Inclusion,
            _ => return Err("expected a command: union or incl"),
        };

        let left = match args.next()
        {
            Some(argument) => argument,
            None => return Err("missing the first automaton file"),
        };

        let right = match args.next()
        {
            Some(argument) => argument,
            None => return Err("missing the second automaton file"),
        };

        Ok(Config { command, left, right })
    }
}

/// Runs the requested command and returns the process exit code: for
/// `union` always 0, for `incl` 0 when the first language is included in
/// the second and 1 otherwise. Parse and I/O failures surface as errors.
pub fn run(config: &Config) -> Result<i32, Box<dyn Error>>
{
    let table = TransitionTable::shared(ALPHABET_WIDTH);

    let left_text = fs::read_to_string(&config.left)?;
    let right_text = fs::read_to_string(&config.right)?;

    let left = parse(&table, &left_text)?;
    let right = parse(&table, &right_text)?;
    info!("parsed automata {} and {}", left.name(), right.name());

    match config.command
    {
        Command::Union =>
        {
            let union = left.union(&right);
            println!("{}", serialize(&union));
            Ok(0)
        }
        Command::Inclusion =>
        {
            let sim_left = SimulationRelation::identity(left.states());
            let sim_right = SimulationRelation::identity(right.states());

            if check_inclusion(&left, &right, &sim_left, &sim_right)
            {
                Ok(0)
            }
            else
            {
                Ok(1)
            }
        }
    }
}
