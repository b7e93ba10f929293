//! Provider listing command

use anyhow::Result;
use colored::Colorize;
use narrow_core::ProviderRegistry;
use tracing::info;

/// Show available providers
pub async fn providers_command() -> Result<()> {
    info!("Listing available providers");

    let registry = ProviderRegistry::default();
    for name in registry.list_providers() {
        if let Some((provider_name, description)) = registry.get_provider_info(name) {
            println!("{:<10} {}", provider_name.bold(), description);
        }
    }

    Ok(())
}
