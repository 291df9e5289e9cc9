pub mod discovery;
pub mod exec;
pub mod format;
pub mod guard;
pub mod lifecycle;
pub mod locks;
pub mod parse;
pub mod partition;
pub mod script;

pub use discovery::Discovery;
pub use exec::ShellRunner;
pub use format::FormatOrchestrator;
pub use guard::SafetyGuard;
pub use lifecycle::Lifecycle;
pub use locks::{LockKey, OpLocks};
pub use partition::PartitionManager;
pub use script::DiskpartScript;

use std::sync::Arc;

use diskforge_core::CommandRunner;

/// The assembled engine: discovery plus every mutating manager, all
/// sharing one command runner, one safety guard and one lock registry.
pub struct DiskEngine {
    discovery: Discovery,
    partitions: PartitionManager,
    lifecycle: Lifecycle,
    formatter: FormatOrchestrator,
}

impl DiskEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, guard: SafetyGuard) -> Self {
        let guard = Arc::new(guard);
        let locks = Arc::new(OpLocks::new());
        let discovery = Discovery::new(Arc::clone(&runner), Arc::clone(&guard));
        let partitions = PartitionManager::new(
            Arc::clone(&runner),
            Arc::clone(&guard),
            Arc::clone(&locks),
            discovery.clone(),
        );
        let lifecycle = Lifecycle::new(
            Arc::clone(&runner),
            Arc::clone(&guard),
            Arc::clone(&locks),
            discovery.clone(),
        );
        let formatter = FormatOrchestrator::new(runner, guard, locks, discovery.clone());

        Self {
            discovery,
            partitions,
            lifecycle,
            formatter,
        }
    }

    /// Engine wired to the real shell with the default protected set.
    pub fn with_shell() -> Self {
        Self::new(Arc::new(ShellRunner), SafetyGuard::default())
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn partitions(&self) -> &PartitionManager {
        &self.partitions
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn formatter(&self) -> &FormatOrchestrator {
        &self.formatter
    }
}
