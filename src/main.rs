mod errors;
mod lexer;
mod parser;

use std::env;
use std::fs;
use std::process;

use lexer::Lexer;
use parser::{Parser, StdoutTrace, TokenList};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("alguma v0.1.0 - syntax analyzer for the Alguma language");
        eprintln!("Usage: alguma <source.alg> [options]");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --tokens         Dump the token stream and exit");
        eprintln!("  --trace          Print each token as it is read and matched");
        eprintln!("  -v | --verbose   Verbose output");
        process::exit(1);
    }

    let source_path = &args[1];
    let mut dump_tokens = false;
    let mut trace = false;
    let mut verbose = false;

    for arg in &args[2..] {
        match arg.as_str() {
            "--tokens" => dump_tokens = true,
            "--trace" => trace = true,
            "--verbose" | "-v" => verbose = true,
            other => {
                eprintln!("Unknown option: {other}");
                process::exit(1);
            }
        }
    }

    let source = match fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{source_path}': {e}");
            process::exit(1);
        }
    };

    if verbose {
        println!("Analyzing {source_path}...");
    }

    let tokens = match Lexer::new(&source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if dump_tokens {
        for token in &tokens {
            println!("{token}");
        }
        return;
    }

    let mut parser = Parser::new(TokenList::new(tokens));
    if trace {
        parser = parser.with_trace(Box::new(StdoutTrace));
    }

    match parser.parse() {
        Ok(()) => println!("syntax ok"),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
