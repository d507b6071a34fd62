use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;

pub fn show_config(path: Option<&Path>) -> Result<()> {
    let config = Config::load(path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    print!("{}", rendered);
    Ok(())
}

pub fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_file()?,
    };
    if target.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", target.display());
    }

    let written = Config::default().save(Some(&target))?;
    println!("Wrote {}", written.display());
    Ok(())
}
