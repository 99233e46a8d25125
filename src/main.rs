mod args;
mod survey;

use clap::Parser;
use env_logger::Env;
use log::{debug, LevelFilter};
use std::error::Error;

fn main() {
    let args = args::Args::parse();

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    debug!("args: {:?}", args);

    if let Err(e) = survey::run_survey(&args) {
        eprintln!("An error occured: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        std::process::exit(1);
    }
}
