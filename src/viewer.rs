//! # Camera Viewer
//!
//! Launches the fullscreen camera viewer on the operator display and stops
//! it again at shutdown. A missing viewer binary is not an error.

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::ViewerConfig;

/// A running viewer process.
#[derive(Debug)]
pub struct Viewer {
    child: Child,
    program: String,
}

impl Viewer {
    /// Start the configured viewer, or return `None` if disabled or unavailable.
    ///
    /// When `kill_existing` is set, any running instance of the same program
    /// is killed first so only one viewer owns the display.
    pub async fn launch(config: &ViewerConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let (program, args) = config.command.split_first()?;

        if config.kill_existing {
            match Command::new("pkill").arg("-x").arg(program).status().await {
                Ok(status) if status.success() => info!("Stopped running {}", program),
                Ok(_) => {}
                Err(e) => warn!("pkill not available: {}", e),
            }
        }

        match Command::new(program).args(args).kill_on_drop(true).spawn() {
            Ok(child) => {
                info!("Launched viewer: {}", config.command.join(" "));
                Some(Self {
                    child,
                    program: program.clone(),
                })
            }
            Err(e) => {
                warn!("Viewer {} not available: {}", program, e);
                None
            }
        }
    }

    /// OS process id, if the viewer has not been reaped yet.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminate the viewer and wait for it to exit.
    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop {}: {}", self.program, e);
            return;
        }
        info!("Stopped viewer {}", self.program);
    }
}
