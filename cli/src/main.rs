use atlas_cli::{Cli, init_logging, run};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    std::process::exit(run(cli));
}
