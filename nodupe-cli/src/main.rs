mod cli;
mod commands;
mod exit;
mod services;

use clap::Parser;
use cli::{Cli, Command};
use nodupe_config::BaseDir;
use services::Services;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        log::error!("{err:#}");
        std::process::exit(exit::exit_code(&err));
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let base_dir = BaseDir::resolve(cli.base_dir.as_deref())?;

    // `archive` bundles an arbitrary file list and doesn't touch the
    // catalog, so it's the one command that doesn't need `Services`.
    if let Command::Archive { paths, output } = cli.command {
        return commands::archive(paths, output);
    }

    let mut services = Services::open(base_dir)?;

    match cli.command {
        Command::Scan {
            paths,
            min_size,
            max_size,
            extensions,
            exclude,
            verbose,
        } => commands::scan(&mut services, paths, min_size, max_size, extensions, exclude, verbose),
        Command::Plan {
            strategy,
            output,
            move_to,
            hardlink,
        } => commands::plan(&mut services, strategy, output, move_to, hardlink),
        Command::Apply { plan, dry_run, yes } => commands::apply(&mut services, plan, dry_run, yes),
        Command::Rollback { last, all, to, dry_run } => {
            commands::rollback(&mut services, last, all, to, dry_run)
        }
        Command::Verify { sample } => commands::verify(&mut services, sample),
        Command::Mount { export } => commands::mount(&mut services, export),
        Command::Archive { .. } => unreachable!("handled above"),
    }
}
