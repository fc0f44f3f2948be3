use std::env;
use std::process;

use sfta_cli::{run, Config};

fn print_help(program: &str)
{
    eprintln!("Run:  {} <command> <file1> <file2>", program);
    eprintln!("where <command> is `union` or `incl` and the files contain");
    eprintln!("tree automata in the Timbuk format.");
}

fn main()
{
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("sfta").to_string();

    let config = Config::new(args.into_iter()).unwrap_or_else(|err| {
        eprintln!("Invalid arguments: {}", err);
        print_help(&program);
        process::exit(2);
    });

    match run(&config)
    {
        Ok(code) => process::exit(code),
        Err(err) =>
        {
            eprintln!("Problem processing input: {}", err);
            process::exit(2);
        }
    }
}
