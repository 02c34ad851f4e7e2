use clap::Parser as _;
use tracing::info;

use crate::{
    models::args::AppArgs,
    run::Run,
    utils::{errors::EmptyResult, logger::LoggerUtils},
};

mod launch;
mod models;
mod provision;
mod run;
mod schemas;
mod utils;

fn main() -> EmptyResult {
    let args = AppArgs::parse();

    LoggerUtils::init(args.verbose);

    let version = env!("CARGO_PKG_VERSION");
    info!("🔧 ComfyUI Provisioner, Version: {version}");

    let run = Run::new(args);
    run.execute()?;

    Ok(())
}
