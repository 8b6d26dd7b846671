use std::path::Path;

use anyhow::Result;
use siteclust_core::{load_settings_from_path, resolve_groups};

pub fn handle(settings: &Path) -> Result<()> {
    let file = load_settings_from_path(settings)?;
    let groups = resolve_groups(&file)?;
    println!(
        "{}: {} group(s) OK",
        settings.display(),
        groups.len()
    );
    for group in &groups {
        println!(
            "  {} regions={} stages={}",
            group.label(),
            group.regions.join("+"),
            group.cluster.len()
        );
    }
    Ok(())
}
