use clap::Parser;
use colored::Colorize as _;

use gitsurgeon::cli::{self, Cli};
use gitsurgeon::log;

fn main() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("{} {info}", "gitsurgeon: internal error:".red().bold());
    }));

    if let Err(err) = log::install_abort_handler() {
        eprintln!("{} {err:#}", "gitsurgeon:".red().bold());
    }

    let cli = Cli::parse();
    if let Err(err) = cli::run(cli) {
        eprintln!("{} {err:#}", "gitsurgeon:".red().bold());
        std::process::exit(1);
    }
}
