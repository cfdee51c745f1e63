use anyhow::Result;
use env_logger::Env;

mod cli;
mod runtime;

fn main() -> Result<()> {
    let (args, verbose) = cli::parse()?;
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    runtime::execute(args)
}
