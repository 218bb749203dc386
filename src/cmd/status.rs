//! `forge status`: print the current loop position, task graph summary,
//! and active blockers.

use crate::cmd::open_store_with_settings;
use anyhow::Result;
use std::path::Path;

pub fn cmd_status(project_root: &Path, workspace: Option<&Path>, settings: Option<&Path>) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let state = store.read_project_state()?;

    println!("phase: {}", state.phase_name);
    println!(
        "loop position [plan execute verify unify]: {}",
        state.loop_position.display()
    );
    println!("next action: {}", state.next_action);
    println!("scars: {} ({} active rules)", state.scar_count, state.active_rule_count);

    if !state.active_blockers.is_empty() {
        println!("active blockers:");
        for b in &state.active_blockers {
            println!("  - {b}");
        }
    }

    match store.read_task_graph()? {
        Some(graph) => {
            println!("\nplan: {} #{} ({} waves)", graph.phase, graph.plan_number, graph.wave_count);
            for wave in 0..graph.wave_count {
                let nodes: Vec<_> = graph.nodes_in_wave(wave).collect();
                if nodes.is_empty() {
                    continue;
                }
                println!("  wave {wave}:");
                for n in nodes {
                    println!("    [{:?}] {} - {}", n.status, n.id, n.description);
                }
            }
        }
        None => println!("\nno task graph yet; run `forge plan`"),
    }

    Ok(())
}
