use std::process;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::Parser;
use rand::Rng;

use sortnet::config::Cli;
use sortnet::normalize::canonical_normalize;
use sortnet::search::run_iterations;
use sortnet::{signal, Config, SearchCtx, State};

/// Print a finished network in canonical form, one comparator per line.
fn print_results(state: &State, length: usize, depth: usize, net_size: usize) {
    let mut ops = state.ops().to_vec();
    canonical_normalize(&mut ops, net_size);

    for (i, op) in ops.iter().enumerate() {
        println!("+{}:({},{})", i + 1, op.lo, op.hi);
    }
    println!("+Length: {length}");
    println!("+Depth : {depth}");
    println!();
}

fn run(ctx: &SearchCtx) -> Result<(), sortnet::SearchError> {
    let net_size = ctx.config.net_size;
    let start = Instant::now();
    let mut rng = rand::thread_rng();

    let iterations = run_iterations(
        ctx,
        || rng.gen(),
        signal::exit_requested,
        |state, length, depth| print_results(state, length, depth, net_size),
    )?;

    println!("Total Iterations  : {iterations}");
    println!("Total Time        : {} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too; only real parse failures
            // are errors.
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            err.print().ok();
            process::exit(code);
        }
    };

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };

    let ctx = SearchCtx::new(config);
    signal::install();
    ctx.config.print();

    if let Err(err) = run(&ctx) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
