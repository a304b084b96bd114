//! repave: synthesizes the CloudWatch agent repave stacks
//!
//! Writes the compute target, config pipeline and command document stacks
//! as a cloud assembly, and publishes the staged bootstrap script.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repave_common::RepaveConfig;
use repave_common::defaults::{DEFAULT_CONFIG_FILE, DEFAULT_OUT_DIR};
use repave_synth::aws::{AwsContext, SecretsClient, classify_anyhow_error, publish_assets};
use repave_synth::secrets::SecretResolver;
use repave_synth::{
    CloudAssembly, DynamicReferenceResolver, FileDocumentSource, SynthInputs, planned_stacks,
    synthesize,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "repave")]
#[command(about = "Synthesize the CloudWatch agent repave stacks")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SynthArgs {
    /// Configuration file (default: ./repave.json if present)
    #[arg(short, long, env = "REPAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Cloud assembly output directory
    #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
    out: PathBuf,

    /// Bootstrap script (overrides compute.user_data_path)
    #[arg(long)]
    user_data: Option<PathBuf>,

    /// Command document (overrides document.path)
    #[arg(long)]
    document: Option<PathBuf>,

    /// Check every referenced secret with Secrets Manager first
    #[arg(long)]
    verify_secrets: bool,

    /// AWS profile used by --verify-secrets
    #[arg(long)]
    aws_profile: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build all stacks and write the cloud assembly
    Synth(SynthArgs),

    /// List the stacks in synthesis order
    List {
        /// Configuration file (default: ./repave.json if present)
        #[arg(short, long, env = "REPAVE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Upload staged assets to the bootstrapped staging bucket
    PublishAssets {
        /// Cloud assembly directory
        #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,

        /// AWS region (default: the configured region)
        #[arg(long)]
        region: Option<String>,

        /// AWS profile to use (overrides AWS_PROFILE env var)
        #[arg(long)]
        aws_profile: Option<String>,

        /// Configuration file (default: ./repave.json if present)
        #[arg(short, long, env = "REPAVE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(hint) = classify_anyhow_error(e).suggestion() {
        let _ = writeln!(stderr, "\n\x1b[36mHint:\x1b[0m {hint}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Load the configuration and the directory its relative paths resolve against
fn load_config(path: Option<&Path>) -> Result<(RepaveConfig, PathBuf)> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };

    match path {
        Some(path) => {
            let config = RepaveConfig::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            let base_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            info!(path = %path.display(), "Loaded configuration");
            Ok((config, base_dir))
        }
        None => Ok((RepaveConfig::default(), PathBuf::from("."))),
    }
}

async fn handle_synth(args: SynthArgs) -> Result<()> {
    let (config, base_dir) = load_config(args.config.as_deref())?;

    let user_data = args
        .user_data
        .unwrap_or_else(|| RepaveConfig::resolve_path(&base_dir, &config.compute.user_data_path));
    let document = FileDocumentSource::new(
        args.document
            .unwrap_or_else(|| RepaveConfig::resolve_path(&base_dir, &config.document.path)),
    );

    let verified;
    let secrets: &dyn SecretResolver = if args.verify_secrets {
        let aws = AwsContext::with_profile(&config.region, args.aws_profile.as_deref()).await;
        verified = SecretsClient::from_context(&aws)
            .verify_all(&[&config.pipeline.oauth_secret])
            .await
            .context("Secret verification failed")?;
        &verified
    } else {
        &DynamicReferenceResolver
    };

    let assembly = synthesize(
        config,
        SynthInputs {
            user_data: &user_data,
            document: &document,
            secrets,
        },
        &args.out,
    )
    .context("Synthesis failed")?;

    for stack in &assembly.manifest().stacks {
        println!("{}", assembly.dir().join(&stack.template_file).display());
    }
    for asset in &assembly.manifest().assets {
        println!("{}", assembly.asset_path(asset).display());
    }
    Ok(())
}

fn handle_list(config: Option<PathBuf>) -> Result<()> {
    let (config, _) = load_config(config.as_deref())?;
    for stack in planned_stacks(&config) {
        if stack.dependencies.is_empty() {
            println!("{}", stack.name);
        } else {
            println!("{} (depends on {})", stack.name, stack.dependencies.join(", "));
        }
    }
    Ok(())
}

async fn handle_publish(
    out: PathBuf,
    region: Option<String>,
    aws_profile: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let (config, _) = load_config(config.as_deref())?;
    let region = region.unwrap_or(config.region);

    let assembly = CloudAssembly::load(&out).with_context(|| {
        format!("No cloud assembly in {}; run `repave synth` first", out.display())
    })?;

    if let Some(profile) = &aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::with_profile(&region, aws_profile.as_deref()).await;
    let report = publish_assets(&aws, &assembly).await?;

    info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        "Asset publishing complete"
    );
    Ok(())
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match args.command {
        Command::Synth(synth_args) => handle_synth(synth_args).await?,
        Command::List { config } => handle_list(config)?,
        Command::PublishAssets {
            out,
            region,
            aws_profile,
            config,
        } => handle_publish(out, region, aws_profile, config).await?,
    }

    Ok(())
}
