use async_trait::async_trait;

use crate::config::ConfigData;
use crate::kernel::error::Result;

/// Capability set every unit managed by the kernel implements.
///
/// The kernel drives a module through `init` (once, at load), then any number
/// of `activate`/`deactivate` pairs, then `destroy` (once, at unload).
/// Lifecycle transitions are serialized. A hook (or a listener it triggers)
/// that calls back into a kernel lifecycle operation gets
/// `Error::TransitionInProgress` instead of waiting on itself.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique name of the module. Must not be empty.
    fn name(&self) -> &str;

    /// Semantic version string, e.g. `"1.0.0"`.
    fn version(&self) -> &str;

    /// Names of modules that must be active before this one.
    ///
    /// Names that are not loaded in the kernel are ignored.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once when the module is loaded, with `config.modules.<name>`.
    async fn init(&self, config: ConfigData) -> Result<()>;

    async fn activate(&self) -> Result<()>;

    async fn deactivate(&self) -> Result<()>;

    /// Called once when the module is unloaded, after `deactivate`.
    async fn destroy(&self) -> Result<()>;

    /// Current configuration as the module sees it.
    fn config(&self) -> ConfigData {
        ConfigData::new()
    }

    async fn update_config(&self, config: ConfigData) -> Result<()>;
}
