//! `kiln inspect`: print the composed build descriptor.

use kiln_config::{describe, BuildDescriptor, BuildMode, ConfigDiscovery};
use std::path::Path;

use crate::cli::InspectArgs;
use crate::commands::utils;
use crate::error::Result;

pub async fn execute(args: InspectArgs) -> Result<()> {
    let context = utils::project_root(args.cwd.as_deref())?;
    let mode = args
        .mode
        .map(BuildMode::from)
        .or_else(BuildMode::from_env)
        .unwrap_or_default();
    let descriptor = compose(&context, mode)?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

pub fn compose(context: &Path, mode: BuildMode) -> Result<BuildDescriptor> {
    let project = ConfigDiscovery::new(context).load()?;
    Ok(describe(&project, context, mode)?)
}
