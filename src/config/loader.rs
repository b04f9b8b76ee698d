// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::model::{PanelFile, RawPanelFile};
use crate::errors::Result;
use crate::store::Workflow;

/// Read and deserialize a panel file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPanelFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawPanelFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Read, deserialize and validate a panel file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PanelFile> {
    let raw_config = load_from_path(&path)?;
    let config = PanelFile::try_from(raw_config)?;
    Ok(config)
}

/// `Taskdeck.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskdeck.toml")
}

/// Directory that relative paths in the panel file resolve against.
pub fn config_base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Build workflow definitions, reading `flow_file` payloads from disk.
///
/// A workflow with neither `flow` nor `flow_file` gets an empty graph.
pub fn resolve_workflows(cfg: &PanelFile, base_dir: &Path) -> Result<Vec<Workflow>> {
    cfg.workflows
        .iter()
        .map(|(id, section)| -> Result<Workflow> {
            let flow_data = match (&section.flow, &section.flow_file) {
                (Some(inline), _) => inline.clone(),
                (None, Some(file)) => {
                    let path = base_dir.join(file);
                    fs::read_to_string(&path).with_context(|| {
                        format!("reading flow file for workflow '{id}': {}", path.display())
                    })?
                }
                (None, None) => String::new(),
            };
            Ok(Workflow {
                id: id.clone(),
                name: if section.name.is_empty() {
                    id.clone()
                } else {
                    section.name.clone()
                },
                enabled: section.enabled,
                flow_data,
                last_run: None,
                next_run: None,
            })
        })
        .collect()
}
