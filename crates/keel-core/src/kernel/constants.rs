/// Application name
pub const APP_NAME: &str = "Keel";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name the kernel looks up to announce lifecycle milestones.
pub const EVENT_BUS_SERVICE: &str = "eventBus";

/// Service name the host registers the storage backend under.
pub const STORAGE_SERVICE: &str = "storage";

/// Top-level config key holding per-module configuration maps.
pub const MODULES_CONFIG_KEY: &str = "modules";

/// Top-level config key holding per-service configuration maps.
pub const SERVICES_CONFIG_KEY: &str = "services";

/// Default `wait_for` timeout in milliseconds.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;
