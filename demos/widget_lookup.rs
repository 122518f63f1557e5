//! Widget lookup example for factory-registry.
//!
//! Demonstrates:
//! - Declaring a process-wide widget registry
//! - Attaching providers from a TOML configuration through a tracker
//! - Looking widgets up with an environment, including the fallback factory
//! - Detaching a provider at runtime
//!
//! Run with: `cargo run --example widget_lookup`

use factory_registry::{
    define_registry, Catalog, Environment, Factory, FactoryError, FnFactory, ProviderDescriptor,
    ProviderTracker, RegistryConfig,
};
use std::sync::Arc;

type WidgetFactory = dyn Factory<Environment, Output = String>;

define_registry!(admin_widgets, WidgetFactory);

fn wizard_widgets() -> Result<Arc<WidgetFactory>, FactoryError> {
    let factory: Arc<WidgetFactory> = Arc::new(FnFactory::new(|id: &str, env: &Environment| {
        let user = env.principal().unwrap_or("anonymous");
        Ok(Some(format!("[wizard page '{id}' for {user}]")))
    }));
    Ok(factory)
}

fn status_widgets() -> Result<Arc<WidgetFactory>, FactoryError> {
    let factory: Arc<WidgetFactory> = Arc::new(FnFactory::new(|id: &str, env: &Environment| {
        let locale = env.locale().unwrap_or("en");
        Ok(Some(format!("[status '{id}' in {locale}]")))
    }));
    Ok(factory)
}

const CONFIG: &str = r#"
conflict_policy = "reject"

[[providers]]
contributor = "org.example.admin"
class = "wizard"
ids = "configuration-wizard, configuration-wizard-finished"
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== factory-registry: Widget Lookup ===\n");

    // -------------------------------------------------------------------------
    // 1. Build the catalog and attach configured providers
    // -------------------------------------------------------------------------
    println!("1. Loading providers from configuration...");

    let catalog = Arc::new(
        Catalog::new()
            .with("wizard", wizard_widgets)
            .with("status", status_widgets),
    );
    let config = RegistryConfig::from_toml_str(CONFIG)?;

    // Providers live in their own registry; the global one falls back to it below.
    let registry = Arc::new(factory_registry::Registry::from_config(&config));
    let tracker = ProviderTracker::new(registry.clone(), catalog);
    let loaded = tracker.load(&config);

    println!("   Registered {loaded} provider(s): {:?}", registry.ids());

    // -------------------------------------------------------------------------
    // 2. A provider attaches at runtime
    // -------------------------------------------------------------------------
    println!("\n2. Attaching a provider at runtime...");

    let status = ProviderDescriptor::new("org.example.monitoring", "status", "server-status");
    tracker.added(status.clone())?;

    println!("   Bound ids: {:?}", registry.ids());

    // -------------------------------------------------------------------------
    // 3. Chain the global registry to the provider registry
    // -------------------------------------------------------------------------
    println!("\n3. Chaining the global registry...");

    let welcome: Arc<WidgetFactory> = Arc::new(FnFactory::new(|_id: &str, _env: &Environment| {
        Ok(Some("[welcome]".to_string()))
    }));
    admin_widgets::register_factory(welcome, ["welcome"])?;
    admin_widgets::set_default_factory(Some(registry.clone()));

    let env = Environment::new()
        .with_locale("de_CH")
        .with_principal("admin");

    for id in ["welcome", "configuration-wizard", "server-status", "unknown"] {
        let widget = admin_widgets::registry().lookup(id, &env)?;
        println!("   {id:<22} -> {widget:?}");
    }

    // -------------------------------------------------------------------------
    // 4. A provider detaches
    // -------------------------------------------------------------------------
    println!("\n4. Detaching the monitoring provider...");

    let released = tracker.removed(&status.key());
    println!("   Released: {released:?}");
    println!(
        "   server-status -> {:?}",
        admin_widgets::registry().lookup("server-status", &env)?
    );

    tracker.close();
    println!("\n=== Done ===");
    Ok(())
}
