use celltrace::cli;
use clap::Parser;
use colored::Colorize;

fn main() {
    let args = cli::Cli::parse();
    if let Err(e) = cli::run(args) {
        eprintln!("{} {e:#}", "error:".bright_red().bold());
        std::process::exit(1);
    }
}
