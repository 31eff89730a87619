use crate::discover::SELF_PACKAGE_NAME;
use crate::runner::DEFAULT_PACKAGE_MANAGER;

/// Server settings assembled from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name reported in `initialize`.
    pub server_name: String,
    /// Package manager command line, e.g. `npm` or `corepack pnpm`.
    pub package_manager: String,
    /// Register the built-in tools before the manifest pass.
    pub builtin_tools: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: SELF_PACKAGE_NAME.to_string(),
            package_manager: DEFAULT_PACKAGE_MANAGER.to_string(),
            builtin_tools: true,
        }
    }
}
