// ABOUTME: Process-wide "interview unlocked" capability latch and its persistence
// ABOUTME: Starts false, may flip to true exactly once, never resets

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::interpreter::SystemEventInterpreter;
use crate::model::Message;

/// Persistence for the latch, kept outside any conversation.
pub trait CapabilityStore: Send + Sync {
    fn load(&self) -> Result<bool>;
    fn persist(&self, unlocked: bool) -> Result<()>;
}

/// Non-durable store, used by tests and short-lived CLI runs.
#[derive(Debug, Default)]
pub struct MemoryCapabilityStore {
    unlocked: Mutex<bool>,
}

impl CapabilityStore for MemoryCapabilityStore {
    fn load(&self) -> Result<bool> {
        let unlocked = self
            .unlocked
            .lock()
            .map_err(|e| anyhow::anyhow!("Capability mutex poisoned: {}", e))?;
        Ok(*unlocked)
    }

    fn persist(&self, unlocked: bool) -> Result<()> {
        let mut guard = self
            .unlocked
            .lock()
            .map_err(|e| anyhow::anyhow!("Capability mutex poisoned: {}", e))?;
        *guard = unlocked;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CapabilityFile {
    interview_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    unlocked_at: Option<String>,
}

/// TOML file store, e.g. `~/.local/share/portal-chat/capabilities.toml`.
#[derive(Debug, Clone)]
pub struct FileCapabilityStore {
    path: PathBuf,
}

impl FileCapabilityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store inside `dir` under the standard file name.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("capabilities.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CapabilityStore for FileCapabilityStore {
    fn load(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let file: CapabilityFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(file.interview_unlocked)
    }

    fn persist(&self, unlocked: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create capability directory")?;
        }
        let file = CapabilityFile {
            interview_unlocked: unlocked,
            unlocked_at: unlocked.then(|| chrono::Utc::now().to_rfc3339()),
        };
        let content = toml::to_string_pretty(&file).context("Failed to serialize capability")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// The "interview unlocked" flag.
///
/// Lifecycle: initialized from its store (false when nothing is persisted);
/// the only transition is false -> true, persisted when it happens; nothing
/// in the chat core resets it. Share one instance per process via `Arc`.
pub struct CapabilityLatch {
    unlocked: AtomicBool,
    store: Box<dyn CapabilityStore>,
}

impl CapabilityLatch {
    pub fn open(store: Box<dyn CapabilityStore>) -> Self {
        let unlocked = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load capability state, assuming locked");
            false
        });
        Self {
            unlocked: AtomicBool::new(unlocked),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::open(Box::<MemoryCapabilityStore>::default())
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    /// Flip to unlocked. Returns true only for the call that made the transition.
    pub fn latch(&self) -> bool {
        if self
            .unlocked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if let Err(e) = self.store.persist(true) {
            // In-memory state stays unlocked for the rest of the process
            tracing::warn!(error = %e, "Failed to persist interview capability");
        }
        tracing::info!("Interview capability unlocked");
        true
    }

    /// Latch if any of `messages` carries the unlocking signal for the actor.
    pub fn observe<'a>(
        &self,
        interpreter: &SystemEventInterpreter,
        messages: impl IntoIterator<Item = &'a Message>,
    ) -> bool {
        if interpreter.derive(messages) {
            self.latch();
        }
        self.is_unlocked()
    }
}

impl std::fmt::Debug for CapabilityLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityLatch")
            .field("unlocked", &self.is_unlocked())
            .field("store", &"<CapabilityStore>")
            .finish()
    }
}
