//! Connection Supervisor
//!
//! Manages the locally spawned service bridge: launch, port discovery, and
//! shutdown. The bridge announces the port it bound by creating an empty
//! file named after the port number inside a manager directory this
//! supervisor owns; discovery is a bounded poll of that directory.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::{Child, Command};

/// Errors from bridge supervision
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The bridge binary could not be started
    #[error("failed to spawn bridge process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The bridge never announced a port
    #[error("no port announced after {attempts} attempts")]
    PortNotFound {
        /// How many directory scans were made
        attempts: u32,
    },
}

/// Supervises one local bridge process
pub struct ConnectionSupervisor {
    manager_dir: TempDir,
    child: Option<Child>,
    port: Option<u16>,
}

impl ConnectionSupervisor {
    /// Spawn the bridge binary and prepare for port discovery
    ///
    /// The child is killed when the supervisor is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] when the manager directory cannot
    /// be created or the binary cannot be started.
    pub fn spawn(binary: &Path, api_server_url: &str) -> Result<Self, SupervisorError> {
        let manager_dir = TempDir::new()?;
        tracing::info!(
            binary = %binary.display(),
            manager_dir = %manager_dir.path().display(),
            "spawning bridge process"
        );

        let child = Command::new(binary)
            .arg(format!("--api_server_url={api_server_url}"))
            .arg(format!("--manager_dir={}", manager_dir.path().display()))
            .kill_on_drop(true)
            .spawn()?;

        Ok(Self {
            manager_dir,
            child: Some(child),
            port: None,
        })
    }

    /// The discovered port, once [`Self::wait_for_port`] has succeeded
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Path of the manager directory the bridge announces into
    #[must_use]
    pub fn manager_dir(&self) -> &Path {
        self.manager_dir.path()
    }

    /// Poll the manager directory until the bridge announces its port
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::PortNotFound`] when no announcement
    /// appears within `attempts` scans spaced `interval` apart.
    pub async fn wait_for_port(
        &mut self,
        attempts: u32,
        interval: Duration,
    ) -> Result<u16, SupervisorError> {
        for attempt in 0..attempts {
            if let Some(port) = find_port(self.manager_dir.path()) {
                tracing::info!(port, attempt, "bridge announced port");
                self.port = Some(port);
                return Ok(port);
            }
            tokio::time::sleep(interval).await;
        }
        Err(SupervisorError::PortNotFound { attempts })
    }

    /// Kill the bridge process
    ///
    /// # Errors
    ///
    /// Propagates the kill failure; the process may already have exited, in
    /// which case this succeeds.
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        if let Some(mut child) = self.child.take() {
            tracing::info!("stopping bridge process");
            child.kill().await?;
        }
        self.port = None;
        Ok(())
    }
}

/// Scan a manager directory for the port announcement
///
/// The announcement is a file whose name is nothing but digits. Returns the
/// first such name that parses as a port.
fn find_port(dir: &Path) -> Option<u16> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(port) = name.parse::<u16>() {
                return Some(port);
            }
        }
    }
    None
}
