use clap::Parser;
use env_logger::Builder;
use ferrogwas::process::{report_fatal, run_command, Args, GwasError};
use log::{debug, LevelFilter};
use rayon::ThreadPoolBuilder;

fn run(args: &Args) -> Result<(), GwasError> {
    if args.threads == 0 {
        return Err(GwasError::Config("--threads must be at least 1".to_string()));
    }
    ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .map_err(|e| GwasError::ThreadPool(e.to_string()))?;
    debug!("Using {} worker threads", args.threads);
    run_command(&args.command)
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Builder::new().filter_level(level).parse_default_env().init();

    if let Err(e) = run(&args) {
        report_fatal(&e);
        std::process::exit(1);
    }
}
