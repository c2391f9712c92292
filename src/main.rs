use camino::Utf8PathBuf;
use clap::Parser;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use assetline::{BuildStagePlanner, Builder, ScriptOptions};

/// Build markup, scripts and styles into a mirrored output tree.
#[derive(Debug, Parser)]
#[command(name = "assetline", version, about)]
struct Args {
    /// JSON build configuration.
    #[arg(short, long, env = "ASSETLINE_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Package metadata used to resolve `{{key}}` placeholders.
    #[arg(short, long, default_value = "package.json")]
    package: Utf8PathBuf,

    /// Public root of the source maps, overrides the configured one.
    #[arg(long, env = "ASSETLINE_SOURCEMAP_URL")]
    sourcemap_url: Option<String>,

    /// Skip the transpiler.
    #[arg(long)]
    no_transpile: bool,

    /// Skip the minifier.
    #[arg(long)]
    no_minify: bool,

    /// Log every copied asset and debug events.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = match verbose {
        true => "assetline=debug",
        false => "assetline=info",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let indicatif = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(indicatif.get_stderr_writer()),
        )
        .with(indicatif)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut builder = Builder::from_files(args.config.as_ref(), &args.package)?;

    if let Some(url) = args.sourcemap_url {
        builder.set_sourcemap_url(Some(url));
    }

    let planner = BuildStagePlanner::new()
        .clean()
        .copy_assets(args.verbose)
        .build_markup()
        .build_scripts(ScriptOptions {
            transpile: !args.no_transpile,
            minify: !args.no_minify,
            ..Default::default()
        })
        .build_styles();

    builder.with_planner(planner).run_blocking()?;

    Ok(())
}
