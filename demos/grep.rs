use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use anyhow::Result;
use clap::Parser;
use lazyre::Regex;

/// Print the lines of FILE that match PATTERN starting at some offset.
#[derive(Parser)]
struct Cli {
    pattern: String,
    file: String,
    /// Print the capture groups of the first match on each line.
    #[arg(short, long)]
    groups: bool,
    /// Print the compiled automaton and exit.
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let re = Regex::new(&args.pattern)?;
    if args.dump {
        print!("{}", re.automaton());
        return Ok(());
    }

    let file = File::open(args.file)?;
    let reader = BufReader::new(file);

    for line in reader.split(b'\n') {
        let line = line?;
        for i in 0..=line.len() {
            let haystack = &line[i..];
            let m = re.find(haystack);
            if m.found() {
                println!("{}", String::from_utf8_lossy(&line));
                if args.groups {
                    print!("{}", m.display(haystack));
                }
                break;
            }
        }
    }

    Ok(())
}
