//! Config Command
//!
//! Usage:
//!   deckweaver config show [--json]
//!   deckweaver config path
//!   deckweaver config init [-g] [--force]

use console::style;
use std::path::Path;

use crate::config::ConfigLoader;
use crate::types::Result;

/// Print the effective configuration (defaults, files, env)
pub fn show(config_path: Option<&Path>, as_json: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    println!("{}", ConfigLoader::render(&config, as_json)?);
    Ok(())
}

pub fn path() -> Result<()> {
    println!("Configuration paths:\n");
    for (label, path) in ConfigLoader::locations() {
        let line = match path {
            Some(path) if path.exists() => format!("{} {}", style("✓").green(), path.display()),
            Some(path) => format!("{} {}", style("✗").dim(), path.display()),
            None => style("(unavailable)").dim().to_string(),
        };
        println!("  {:<8} {}", format!("{}:", label), line);
    }
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };
    println!("✓ Configuration at {}", path.display());
    if !global {
        println!();
        println!("Next steps:");
        println!("  1. Set agent.endpoint and deck.template_id");
        println!("  2. Export DECKWEAVER_JUDGE_API_KEY and Google credentials");
        println!("  3. Run 'deckweaver generate <merchant> <start> <end>'");
    }
    Ok(())
}
