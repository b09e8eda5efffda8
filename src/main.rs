use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use clinic_soap::consultation::{Consultation, ConsultationRecord, ConsultationSource, InMemoryConsultations};
use clinic_soap::context::HISTORY_WINDOW;
use clinic_soap::server::{self, AppState};
use clinic_soap::{Settings, SoapGenerator};

/// AI-assisted SOAP note drafts for clinic consultations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.clinic-soap/config.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Consultation data file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Listen address, overrides config and CLINIC_SOAP_BIND
        #[arg(short, long)]
        bind: Option<String>,

        /// Include internal error text in error responses
        #[arg(long)]
        debug: bool,
    },

    /// Generate a SOAP draft for one consultation and print it as JSON
    Generate {
        /// Consultation data file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Consultation ID
        #[arg(long)]
        consultation: u64,
    },

    /// Print the prompt that would be sent for a consultation, without calling a model
    Prompt {
        /// Consultation data file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Consultation ID
        #[arg(long)]
        consultation: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);

    let settings = Settings::load(args.config.as_deref())?;
    debug!("Loaded settings: {:?}", settings);

    match args.command {
        Command::Serve { data, bind, debug } => run_serve(settings, &data, bind, debug).await,
        Command::Generate { data, consultation } => run_generate(&settings, &data, consultation).await,
        Command::Prompt { data, consultation } => run_prompt(&settings, &data, consultation).await,
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    // Logs go to stderr so stdout stays clean for JSON output
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run_serve(mut settings: Settings, data: &Path, bind: Option<String>, debug: bool) -> Result<()> {
    if let Some(bind) = bind {
        settings.bind_addr = bind;
    }
    settings.debug |= debug;

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", settings.bind_addr))?;

    let source = InMemoryConsultations::load(data)?;
    let state = AppState {
        generator: SoapGenerator::from_settings(&settings)?,
        source: Arc::new(source),
        debug: settings.debug,
    };

    server::serve(state, addr).await
}

/// Load the consultation and its history, rejecting a blank chief complaint
async fn load_visit(
    source: &InMemoryConsultations,
    id: u64,
) -> Result<(ConsultationRecord, Vec<Consultation>)> {
    let Some(record) = source.consultation(id).await? else {
        bail!("Consultation {} not found", id);
    };
    if record.consultation.chief_complaint.trim().is_empty() {
        bail!("Chief complaint is required to generate SOAP notes.");
    }
    let prior = source
        .prior_visits(record.patient.id, id, HISTORY_WINDOW)
        .await?;
    Ok((record, prior))
}

async fn run_generate(settings: &Settings, data: &Path, id: u64) -> Result<()> {
    let generator = SoapGenerator::from_settings(settings)?;
    if !generator.is_configured() {
        bail!("AI service is not configured. Set DEFAULT_LLM_MODEL or an API key.");
    }

    let source = InMemoryConsultations::load(data)?;
    let (record, prior) = load_visit(&source, id).await?;

    let generation = generator.generate(&record, &prior).await?;
    info!("Draft generated with {}", generation.model_used);

    let output = serde_json::to_string_pretty(&generation).context("Failed to serialize SOAP draft")?;
    println!("{}", output);
    Ok(())
}

async fn run_prompt(settings: &Settings, data: &Path, id: u64) -> Result<()> {
    let generator = SoapGenerator::from_settings(settings)?;
    let source = InMemoryConsultations::load(data)?;
    let (record, prior) = load_visit(&source, id).await?;

    let (context, prompt) = generator.prepare(&record, &prior);
    let output = serde_json::to_string_pretty(&serde_json::json!({
        "context": context,
        "system_instructions": prompt.system_instructions,
        "user_message": prompt.user_message,
    }))
    .context("Failed to serialize prompt")?;
    println!("{}", output);
    Ok(())
}
