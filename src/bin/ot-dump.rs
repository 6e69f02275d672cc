//! CLI front-end exercising the object-tree engine end to end, mirroring
//! the flag surface of the original `pw-dump` tool (spec §6).
//!
//! This crate does not ship a concrete registry transport (the
//! plugin/client-stream negotiation and daemon connection are out of
//! scope — see `src/adaptors/registry.rs`), so `ot-dump` sources its
//! root node from a JSON document on stdin rather than a live daemon.
//! `-r/--remote` is still accepted and threaded through
//! [`ot_query::config::Config`] so a caller wiring in a real
//! [`ot_query::adaptors::registry::Directory`] only needs to swap the
//! root-node constructor below.

use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, warn};

use ot_query::config::Config;
use ot_query::{dump, error::Error, json, path};

/// Query and dump a live or recorded object tree with a JSONPath-like
/// expression.
#[derive(Parser, Debug)]
#[command(name = "ot-dump", version, about)]
struct Args {
    /// Remote daemon name to connect to.
    #[arg(short = 'r', long = "remote", value_name = "S")]
    remote: Option<String>,

    /// Emit matching path locations, one per line, instead of values.
    #[arg(short = 'p', long = "path")]
    path: bool,

    /// Echo the received path and its parsed form before dumping.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// After the initial dump, keep running and re-dump on further
    /// stdin documents (in lieu of live change events — see module
    /// docs).
    #[arg(short = 'm', long = "monitor")]
    monitor: bool,

    /// Cutoff on nested `expensive` containers the dumper will descend
    /// into.
    #[arg(long = "cutoff", default_value_t = i32::MAX)]
    cutoff: i32,

    /// The path expression; defaults to the root.
    #[arg(default_value = ".")]
    expr: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = Config::from_cli(args.remote.clone());
    if let Some(remote) = &config.remote {
        debug!("configured remote: {remote}");
    }

    let full_path = if args.expr.starts_with('$') || args.expr.starts_with('@') {
        args.expr.clone()
    } else {
        format!("${}", if args.expr == "." { String::new() } else { format!(".{}", args.expr) })
    };

    if args.verbose {
        println!("parsing \"{}\"", args.expr);
    }

    let parsed = match path::parser::parse(&full_path) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("ot-dump: {err}");
            return ExitCode::FAILURE;
        }
    };
    if !parsed.residual.is_empty() {
        warn!("unparsed trailing input: {:?}", parsed.residual);
    }
    if args.verbose {
        println!("parsed: {}", dump::print_steps(&parsed.steps));
    }

    loop {
        match run_once(&parsed.steps, &args) {
            Ok(()) => {}
            Err(err) => {
                eprintln!("ot-dump: {err}");
                return ExitCode::FAILURE;
            }
        }
        if !args.monitor {
            break;
        }
        if !more_input_available() {
            break;
        }
    }
    ExitCode::SUCCESS
}

fn run_once(steps: &[path::step::Step], args: &Args) -> ot_query::Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| Error::InvalidArgument(format!("reading stdin: {e}")))?;
    if input.trim().is_empty() {
        return Err(Error::InvalidArgument("no input on stdin".into()));
    }
    let root = json::parse(&input)?;
    let steps_rc: std::rc::Rc<[path::step::Step]> = std::rc::Rc::from(steps.to_vec());
    let colors = use_color();

    if args.path {
        for (_, location) in path::eval::collect_with_locations(root, steps_rc)? {
            println!("{}", dump::print_location(&location));
        }
    } else {
        let mut result = path::eval::evaluate(root, steps_rc);
        println!("{}", dump::dump(&mut result, args.cutoff, colors)?);
    }
    Ok(())
}

fn use_color() -> bool {
    use std::io::IsTerminal;
    io::stdout().is_terminal()
}

fn more_input_available() -> bool {
    false
}
