//! `forge scars`: list recorded scars and the active prevention-rule
//! digest fed into subsequent context packets.

use crate::cmd::open_store_with_settings;
use crate::scars::ScarRegistry;
use anyhow::Result;
use std::path::Path;

pub fn cmd_scars(project_root: &Path, workspace: Option<&Path>, settings: Option<&Path>) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let registry = ScarRegistry::new(&store);
    let scars = registry.list_all()?;

    if scars.is_empty() {
        println!("no scars recorded");
        return Ok(());
    }

    for scar in &scars {
        let state = if scar.is_open() { "open" } else { "promoted" };
        println!(
            "[{state}] {} ({:?}) — {}\n  cause: {}\n  rule: {}",
            scar.id, scar.category, scar.description, scar.root_cause, scar.prevention_rule
        );
    }

    println!("\nactive prevention rules:\n{}", registry.render_digest()?);
    Ok(())
}
