use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::workers::WorkerStage;

#[derive(Parser, Debug)]
#[command(name = "dtce")]
#[command(about = "Document template & context engine: ingestion/parsing/analysis pipeline and gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway (C9): submit/status/results/file-serving routes.
    Api(ApiArgs),

    /// Run one pipeline worker process (C5-C7), bound to a single topic.
    Worker(WorkerArgs),

    /// Render an OOXML document from Template/Context JSON, standalone of
    /// the pipeline (spec §9: "the renderer is invoked by tools and the
    /// template-creation path, not the main pipeline").
    Render(RenderArgs),
}

#[derive(clap::Args, Debug)]
pub struct ApiArgs {
    /// Address to bind the gateway's HTTP server to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub address: SocketAddr,
}

#[derive(clap::Args, Debug)]
pub struct WorkerArgs {
    /// Which stage to run: ingestion, parsing, or analysis.
    #[arg(value_enum)]
    pub stage: WorkerStage,
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Path to a TemplateJson file.
    #[arg(long)]
    pub template: PathBuf,

    /// Path to a ContextJson file. Omit to render the placeholder
    /// (fill-in-the-blanks) variant instead of the final-content one.
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Where to write the rendered `.docx` bytes.
    #[arg(long)]
    pub output: PathBuf,

    /// Embed logo/image assets from `TemplateJson.LogoMap` (spec §4.8 step 3).
    #[arg(long)]
    pub include_logos: bool,

    /// Download logo bytes from the configured object store by
    /// `LogoAsset.StorageKey` (ignored unless `--include-logos` is set).
    #[arg(long)]
    pub include_template_logos_from_storage: bool,

    /// Emit a `{{PlaceholderId}}` paragraph for sections with no resolved
    /// content, instead of leaving them empty.
    #[arg(long)]
    pub emit_placeholder_for_missing_content: bool,
}
