//! Workspace Store (C1): atomic read/write of governance files, the task
//! graph, the mission log, and checkpoints.
//!
//! Concurrency: single writer per file (`atomic::write_atomic` takes an
//! exclusive lock); reads are lock-free, relying on the atomicity of
//! rename. On startup, if the workspace root is absent every operation but
//! `initialise` refuses with `StoreError::WorkspaceAbsent`.

pub mod atomic;
pub mod hash_index;
pub mod layout;
pub mod mission_log;

use crate::errors::StoreError;
use crate::settings::Settings;
use forge_common::{ProjectState, Scar, TaskGraph};
use layout::WorkspaceLayout;
use mission_log::MissionLog;
use std::fs;

pub struct WorkspaceStore {
    pub layout: WorkspaceLayout,
}

impl WorkspaceStore {
    pub fn open(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            layout: WorkspaceLayout::new(root),
        }
    }

    fn require_initialised(&self) -> Result<(), StoreError> {
        if !self.layout.exists() {
            return Err(StoreError::WorkspaceAbsent {
                path: self.layout.root.clone(),
            });
        }
        Ok(())
    }

    /// Materialise the numbered skeleton and default settings. The only
    /// operation permitted when the workspace root is absent.
    pub fn initialise(&self, project_name: &str) -> Result<(), StoreError> {
        for dir in self.layout.all_dirs() {
            fs::create_dir_all(&dir).map_err(|source| StoreError::AtomicWriteFailed {
                path: dir,
                source,
            })?;
        }

        let mut settings = Settings::default();
        settings.project.name = Some(project_name.to_string());
        atomic::write_json_atomic(&self.layout.settings_file(), &settings)?;

        atomic::write_atomic(
            &self.layout.state_file(),
            format!("# Project State\n\n_initialised for {project_name}_\n").as_bytes(),
        )?;

        atomic::write_json_atomic(&self.layout.scars_file(), &Vec::<Scar>::new())?;
        atomic::write_json_atomic(
            &self.layout.active_rules_file(),
            &Vec::<String>::new(),
        )?;

        let state = ProjectState::new("planning");
        atomic::write_json_atomic(&self.layout.runtime_dir().join("project-state.json"), &state)?;

        Ok(())
    }

    pub fn read_settings(&self) -> Result<Settings, StoreError> {
        self.require_initialised()?;
        if !self.layout.settings_file().exists() {
            return Ok(Settings::default());
        }
        atomic::read_json(&self.layout.settings_file())
    }

    pub fn write_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.require_initialised()?;
        atomic::write_json_atomic(&self.layout.settings_file(), settings)
    }

    pub fn read_task_graph(&self) -> Result<Option<TaskGraph>, StoreError> {
        self.require_initialised()?;
        let path = self.layout.task_graph_file();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(atomic::read_json(&path)?))
    }

    pub fn write_task_graph(&self, graph: &TaskGraph) -> Result<(), StoreError> {
        self.require_initialised()?;
        atomic::write_json_atomic(&self.layout.task_graph_file(), graph)
    }

    pub fn read_project_state(&self) -> Result<ProjectState, StoreError> {
        self.require_initialised()?;
        let path = self.layout.runtime_dir().join("project-state.json");
        if !path.exists() {
            return Ok(ProjectState::new("planning"));
        }
        atomic::read_json(&path)
    }

    pub fn write_project_state(&self, state: &ProjectState) -> Result<(), StoreError> {
        self.require_initialised()?;
        atomic::write_json_atomic(&self.layout.runtime_dir().join("project-state.json"), state)
    }

    pub fn read_scars(&self) -> Result<Vec<Scar>, StoreError> {
        self.require_initialised()?;
        let path = self.layout.scars_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        atomic::read_json(&path)
    }

    pub fn write_scars(&self, scars: &[Scar]) -> Result<(), StoreError> {
        self.require_initialised()?;
        atomic::write_json_atomic(&self.layout.scars_file(), &scars.to_vec())
    }

    pub fn mission_log(&self) -> MissionLog {
        MissionLog::new(self.layout.mission_log_file())
    }
}
