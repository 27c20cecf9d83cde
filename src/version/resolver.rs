//! Provider pairing per tracked component
//!
//! Groups the local and remote providers that together answer "installed vs. latest"
//! for one component.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{CLI_PACKAGE_NAME, ExtensionRegistry, ProviderSettings};
use crate::version::provider::{LatestVersionProvider, LocalVersionProvider};
use crate::version::providers::{
    CliVersionProvider, EditorExtensionProvider, NpmRegistry, OpenVsxRegistry,
};
use crate::version::types::Component;

/// Local and remote providers for one component
#[derive(Clone)]
pub struct ComponentResolver {
    local: Arc<dyn LocalVersionProvider>,
    remote: Arc<dyn LatestVersionProvider>,
}

impl ComponentResolver {
    pub fn new(
        local: Arc<dyn LocalVersionProvider>,
        remote: Arc<dyn LatestVersionProvider>,
    ) -> Self {
        Self { local, remote }
    }

    /// Provider for the installed version
    pub fn local(&self) -> &Arc<dyn LocalVersionProvider> {
        &self.local
    }

    /// Provider for the latest published version
    pub fn remote(&self) -> &Arc<dyn LatestVersionProvider> {
        &self.remote
    }
}

/// Create the default resolvers for every tracked component
pub fn create_default_resolvers(
    settings: &ProviderSettings,
) -> HashMap<Component, ComponentResolver> {
    let mut resolvers = HashMap::new();
    let npm_registry = Arc::new(NpmRegistry::new(&settings.npm_registry, CLI_PACKAGE_NAME));

    resolvers.insert(
        Component::Cli,
        ComponentResolver::new(
            Arc::new(CliVersionProvider::new(&settings.cli_command)),
            npm_registry.clone(),
        ),
    );

    let extension_remote: Arc<dyn LatestVersionProvider> = match settings.extension_registry {
        ExtensionRegistry::Npm => npm_registry,
        ExtensionRegistry::OpenVsx => Arc::new(OpenVsxRegistry::new(
            &settings.open_vsx_url,
            "anthropic",
            "claude-code",
        )),
    };

    resolvers.insert(
        Component::EditorExtension,
        ComponentResolver::new(
            Arc::new(EditorExtensionProvider::new(&settings.editor_command)),
            extension_remote,
        ),
    );

    resolvers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_default_resolvers_covers_every_component() {
        let resolvers = create_default_resolvers(&ProviderSettings::default());

        for component in Component::ALL {
            assert!(resolvers.contains_key(&component), "{} missing", component);
        }
    }
}
