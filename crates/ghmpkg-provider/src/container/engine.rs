//! Container engine seam and its docker CLI implementation.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use ghmpkg_utils::fs::ensure_dir_exists;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{ProviderError, Result},
    tool::{run_checked, ToolCommand, ToolRunner},
};

/// An authenticated registry login.
///
/// Each login keeps its own credential store so that source and target accounts on the
/// same registry host do not overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySession {
    pub registry: String,
    pub config_dir: PathBuf,
}

/// Identity and labels of a local image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub id: String,
    pub labels: BTreeMap<String, String>,
}

/// Operations on a local container engine.
pub trait ContainerEngine: Send + Sync {
    fn login(&self, registry: &str, username: &str, token: &str, name: &str)
        -> Result<RegistrySession>;

    fn pull(&self, session: &RegistrySession, image: &str) -> Result<()>;

    /// Writes `image` to a tar archive at `dest`.
    fn save(&self, image: &str, dest: &Path) -> Result<()>;

    fn load(&self, archive: &Path) -> Result<()>;

    /// Details of a local image, or `None` when the engine does not have it.
    fn inspect(&self, image: &str) -> Result<Option<ImageDetails>>;

    fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Creates a stopped container from `image` with `labels`, returning its id.
    fn create(&self, image: &str, labels: &BTreeMap<String, String>) -> Result<String>;

    /// Commits a container as a new image reference carrying `labels`.
    fn commit(&self, container: &str, image: &str, labels: &BTreeMap<String, String>)
        -> Result<()>;

    fn remove_container(&self, container: &str) -> Result<()>;

    fn push(&self, session: &RegistrySession, image: &str) -> Result<()>;
}

/// [`ContainerEngine`] driving the `docker` CLI.
pub struct DockerCli {
    runner: Arc<dyn ToolRunner>,
    program: String,
    sessions_root: PathBuf,
}

impl DockerCli {
    pub fn new(runner: Arc<dyn ToolRunner>, sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: "docker".to_string(),
            sessions_root: sessions_root.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.program)
    }

    fn run(&self, command: ToolCommand) -> Result<String> {
        Ok(run_checked(self.runner.as_ref(), &command)?.stdout)
    }
}

fn label_change(key: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("LABEL {key}=\"{escaped}\"")
}

fn parse_inspect(stdout: &str) -> Result<ImageDetails> {
    let value: Value = serde_json::from_str(stdout.trim()).map_err(|err| {
        ProviderError::Custom(format!("unreadable image inspect output: {err}"))
    })?;
    let id = value
        .get("Id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Custom("image inspect output has no Id".into()))?
        .to_string();
    let labels = value
        .pointer("/Config/Labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();
    Ok(ImageDetails {
        id,
        labels,
    })
}

impl ContainerEngine for DockerCli {
    fn login(
        &self,
        registry: &str,
        username: &str,
        token: &str,
        name: &str,
    ) -> Result<RegistrySession> {
        let config_dir = self.sessions_root.join(name);
        ensure_dir_exists(&config_dir)?;

        let cmd = self
            .command()
            .arg("--config")
            .arg(config_dir.display().to_string())
            .args(["login", registry, "-u", username, "--password-stdin"])
            .stdin(token);
        run_checked(self.runner.as_ref(), &cmd).map_err(|err| {
            ProviderError::Auth {
                registry: registry.to_string(),
                reason: err.to_string(),
            }
        })?;
        debug!(registry, session = name, "logged in");

        Ok(RegistrySession {
            registry: registry.to_string(),
            config_dir,
        })
    }

    fn pull(&self, session: &RegistrySession, image: &str) -> Result<()> {
        self.run(
            self.command()
                .arg("--config")
                .arg(session.config_dir.display().to_string())
                .args(["pull", image]),
        )?;
        Ok(())
    }

    fn save(&self, image: &str, dest: &Path) -> Result<()> {
        self.run(
            self.command()
                .args(["save", "-o"])
                .arg(dest.display().to_string())
                .arg(image),
        )?;
        Ok(())
    }

    fn load(&self, archive: &Path) -> Result<()> {
        self.run(
            self.command()
                .args(["load", "-i"])
                .arg(archive.display().to_string()),
        )?;
        Ok(())
    }

    fn inspect(&self, image: &str) -> Result<Option<ImageDetails>> {
        let cmd = self
            .command()
            .args(["image", "inspect", "--format", "{{json .}}", image]);
        let output = self.runner.run(&cmd)?;
        if !output.success() {
            return Ok(None);
        }
        parse_inspect(&output.stdout).map(Some)
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.run(self.command().args(["tag", source, target]))?;
        Ok(())
    }

    fn create(&self, image: &str, labels: &BTreeMap<String, String>) -> Result<String> {
        let mut cmd = self.command().arg("create");
        for (key, value) in labels {
            cmd = cmd.arg("--label").arg(format!("{key}={value}"));
        }
        let id = self.run(cmd.arg(image))?;
        Ok(id.trim().to_string())
    }

    fn commit(
        &self,
        container: &str,
        image: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<()> {
        let mut cmd = self.command().arg("commit");
        for (key, value) in labels {
            cmd = cmd.arg("--change").arg(label_change(key, value));
        }
        self.run(cmd.args([container, image]))?;
        Ok(())
    }

    fn remove_container(&self, container: &str) -> Result<()> {
        self.run(self.command().args(["rm", "-f", container]))?;
        Ok(())
    }

    fn push(&self, session: &RegistrySession, image: &str) -> Result<()> {
        self.run(
            self.command()
                .arg("--config")
                .arg(session.config_dir.display().to_string())
                .args(["push", image]),
        )?;
        Ok(())
    }
}
