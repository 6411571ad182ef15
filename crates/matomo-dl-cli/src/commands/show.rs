use super::{json_pretty, EXIT_SUCCESS};
use console::Style;
use matomo_dl_schema::{LockFile, PluginLock};
use std::path::Path;

pub fn run(lock_path: &Path, json: bool) -> Result<u8, String> {
    let lock = LockFile::read_from_file(lock_path).map_err(|e| format!("lock file: {e}"))?;

    if json {
        println!("{}", json_pretty(&lock)?);
        return Ok(EXIT_SUCCESS);
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();
    println!("matomo {}", bold.apply_to(&lock.core.version));
    println!("  link: {}", lock.core.link);
    if !lock.core.extraction_root.is_empty() {
        println!("  root: {}/", lock.core.extraction_root);
    }
    for hash in &lock.core.hashes {
        println!("  {}", dim.apply_to(hash));
    }

    if lock.plugins.is_empty() {
        println!("no plugins");
    } else {
        println!("plugins ({}):", lock.plugins.len());
        for (name, plugin) in &lock.plugins {
            match plugin {
                PluginLock::Versioned { version, .. } => {
                    println!("  {} {}", name, bold.apply_to(version));
                }
                PluginLock::Git { commit, .. } => {
                    println!("  {} {}", name, dim.apply_to(commit));
                }
            }
        }
    }
    println!("spec hash: {}", dim.apply_to(&lock.spec_hash));
    Ok(EXIT_SUCCESS)
}
