mod cli;

use clap::Parser;
use cli::{Cli, Commands, RenderArgs};
use dtce::{
    api,
    config::Config,
    model::{ContextJson, TemplateJson},
    renderer::{self, RenderOptions},
    storage::DocumentStore,
    workers,
};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Api(args) => api::run(args.address).await?,
        Commands::Worker(args) => {
            let config = Config::load().map_err(|e| format!("failed to load config: {e}"))?;
            workers::run(config, args.stage).await?
        }
        Commands::Render(args) => render_command(args).await?,
    }

    Ok(())
}

/// `dtce render` (spec §9): a standalone entry point for the template
/// renderer, independent of the job pipeline.
async fn render_command(args: RenderArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let template_bytes = tokio::fs::read(&args.template).await?;
    let template: TemplateJson = serde_json::from_slice(&template_bytes)?;

    let context = match &args.context {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            Some(serde_json::from_slice::<ContextJson>(&bytes)?)
        }
        None => None,
    };

    let store: Option<Arc<dyn DocumentStore>> = if args.include_logos && args.include_template_logos_from_storage {
        let config = Config::load().map_err(|e| format!("failed to load config: {e}"))?;
        let (store, _ledger, _bus) = api::build_backends(&config).await?;
        Some(store)
    } else {
        None
    };
    let store_ref = store.as_deref();

    let bytes = match &context {
        Some(context) => {
            let options = RenderOptions {
                include_logos: args.include_logos,
                include_template_logos_from_storage: args.include_template_logos_from_storage,
                emit_placeholder_for_missing_content: args.emit_placeholder_for_missing_content,
                content_overrides: HashMap::new(),
                logo_overrides: HashMap::new(),
            };
            renderer::render(&template, Some(context), &options, store_ref).await?
        }
        None => renderer::render_template(&template, store_ref).await?,
    };

    tokio::fs::write(&args.output, &bytes).await?;
    tracing::info!(output = %args.output.display(), "rendered OOXML document");
    Ok(())
}
