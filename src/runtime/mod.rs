//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that owns the framer
//! hierarchy, the shared store and the behavior registry, and drives them
//! tick by tick.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

// Submodules
pub mod act;
pub mod behavior;
pub mod error;
pub mod hierarchy;
pub mod path;
pub mod plan;
pub mod registry;
pub mod resolve;
pub mod runner;
pub mod store;

/// Configuration for the strata runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Namespace for I/O-initializers that do not declare an `inode`
    pub default_inode: String,

    /// Resolve every descriptor in `start` instead of on first use
    pub resolve_on_start: bool,

    /// Filter directive used by `install_tracing`
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_inode: "framer.me.frame.me.actor.me.".to_string(),
            resolve_on_start: true,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_vec_pretty(self).context("Failed to encode config")?;
        fs::write(path, data).with_context(|| format!("Failed to write config file: {:?}", path))
    }
}

/// Install a global tracing subscriber using the given filter directive.
///
/// Does nothing if a subscriber is already installed.
pub fn install_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

use hierarchy::Hierarchy;
use registry::BehaviorRegistry;
use store::Store;

/// The main runtime orchestrator
///
/// Owns the hierarchy and the store, binds descriptors through the registry
/// and steps every active framer once per tick.
pub struct Runtime {
    config: RuntimeConfig,
    registry: BehaviorRegistry,
    /// Shared data store
    pub store: Store,
    /// Framers, frames and descriptors
    pub hierarchy: Hierarchy,
    resolvables: Vec<FramerId>,
    ticks: u64,
}

impl Runtime {
    /// Create a runtime with an empty hierarchy
    pub fn new(config: RuntimeConfig, registry: BehaviorRegistry) -> Self {
        Self {
            config,
            registry,
            store: Store::new(),
            hierarchy: Hierarchy::new(),
            resolvables: Vec::new(),
            ticks: 0,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the behavior registry
    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Number of completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Framers waiting to have their descriptors resolved
    pub fn resolvables(&self) -> &[FramerId] {
        &self.resolvables
    }

    /// Queue a framer for resolution before its first use
    pub fn add_resolvable(&mut self, framer: FramerId) {
        self.resolvables.push(framer);
    }

    /// Resolve every descriptor attached to a framer's frames
    pub fn resolve_framer(&mut self, framer: FramerId) -> Result<()> {
        for act in self.hierarchy.framer_acts(framer) {
            self.resolve_act(act)?;
        }
        Ok(())
    }

    /// Resolve every framer that can run: everything except templates and
    /// pruned framers
    pub fn resolve_all(&mut self) -> Result<()> {
        let framers: Vec<FramerId> = self
            .hierarchy
            .framer_ids()
            .filter(|&id| self.hierarchy.framer(id).schedule != Schedule::Moot)
            .collect();
        for framer in framers {
            self.resolve_framer(framer)?;
        }
        Ok(())
    }

    /// Resolve framers queued since the last call
    pub fn resolve_pending(&mut self) -> Result<()> {
        while !self.resolvables.is_empty() {
            let pending = std::mem::take(&mut self.resolvables);
            for framer in pending {
                if !self.hierarchy.framer(framer).pruned {
                    debug!(framer = %self.hierarchy.framer(framer).name, "resolving queued framer");
                    self.resolve_framer(framer)?;
                }
            }
        }
        Ok(())
    }

    fn active_framers(&self) -> Vec<FramerId> {
        self.hierarchy
            .framer_ids()
            .filter(|&id| self.hierarchy.framer(id).schedule == Schedule::Active)
            .collect()
    }

    /// Bind descriptors (when configured to) and enter every active framer
    /// whose start check passes
    pub fn start(&mut self) -> Result<()> {
        if self.config.resolve_on_start {
            self.resolve_all()?;
        }
        for framer in self.active_framers() {
            if self.check_start(framer)? {
                self.enter_all(framer)?;
            } else {
                info!(framer = %self.hierarchy.framer(framer).name, "start refused");
            }
        }
        Ok(())
    }

    /// Run one scheduling step of every running active framer
    pub fn tick(&mut self) -> Result<()> {
        self.resolve_pending()?;
        self.hierarchy.reclaim();
        for framer in self.active_framers() {
            let running = self.hierarchy.framer(framer);
            if !running.done && !running.actives.is_empty() {
                self.run_step(framer)?;
            }
        }
        self.ticks += 1;
        Ok(())
    }
}

// Re-export commonly used types
pub use act::{Act, Arg, Args};
pub use behavior::{Behavior, BehaviorKind, Call, Outcome};
pub use error::{Result, RuntimeError};
pub use hierarchy::{ActId, Context, FrameId, FramerId, Schedule};
pub use registry::BehaviorCatalog;
