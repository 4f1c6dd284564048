//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::PathBuf;
use std::process::Command as Process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use framecontext_core::{
    ContextBuilder, ContextMetadata, FrameChannel, HostElement, ParseStatus, StaticWindow,
};
use framecontext_document::{HtmlDocument, PageServices};
use framecontext_shared::{
    AppConfig, AttributeMap, ContextBundle, Mode, Sentinel, init_config, load_config,
    load_config_from,
};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// FrameContext: hand host context to embedded frames.
#[derive(Parser)]
#[command(
    name = "framecontext",
    version,
    about = "Build and inspect the context bundles handed from a host page to its embedded frames.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.framecontext/framecontext.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the channel payload for an embed element in an HTML page.
    Build {
        #[command(flatten)]
        host: HostArgs,
    },

    /// Decode a channel payload and print what the embed would see.
    Inspect {
        /// Payload to decode. Reads the process channel when omitted.
        payload: Option<String>,

        /// Read the payload from stdin.
        #[arg(long, conflicts_with = "payload")]
        stdin: bool,
    },

    /// Build a payload and run a command with it in the channel variable.
    Spawn {
        #[command(flatten)]
        host: HostArgs,

        /// Program and arguments to run as the embed.
        #[arg(last = true, required = true)]
        program: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Host page and element selection shared by `build` and `spawn`.
#[derive(Args)]
pub(crate) struct HostArgs {
    /// HTML file of the hosting page.
    #[arg(long)]
    pub html: PathBuf,

    /// CSS selector of the embed element.
    #[arg(long, default_value = "amp-ad")]
    pub selector: String,

    /// Address of the hosting window.
    #[arg(long)]
    pub location: String,

    /// Address of the parent window (used when the host is about:srcdoc).
    #[arg(long)]
    pub parent_location: Option<String>,

    /// Address the page was served from (defaults to --location).
    #[arg(long)]
    pub source_url: Option<String>,

    /// Referrer reported by the viewer.
    #[arg(long)]
    pub referrer: Option<String>,

    /// Report the host as hidden.
    #[arg(long)]
    pub hidden: bool,

    /// Sentinel to use (generated when omitted).
    #[arg(long)]
    pub sentinel: Option<String>,

    /// Embed type (defaults to the element's `type` attribute).
    #[arg(long = "type")]
    pub embed_type: Option<String>,

    /// Pre-seeded attribute, KEY=VALUE (repeatable).
    #[arg(long = "attr", value_parser = parse_key_value)]
    pub attrs: Vec<(String, String)>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout
/// carries only payloads and reports.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "framecontext_cli=info,framecontext_core=info",
        1 => "framecontext_cli=debug,framecontext_core=debug,framecontext_document=debug",
        _ => "framecontext_cli=trace,framecontext_core=trace,framecontext_document=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Build { host } => cmd_build(&config, &host),
        Command::Inspect { payload, stdin } => cmd_inspect(&config, payload, stdin),
        Command::Spawn { host, program } => cmd_spawn(&config, &host, &program),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(config: &AppConfig, host: &HostArgs) -> Result<()> {
    let (payload, sentinel) = build_payload(config, host)?;
    info!(%sentinel, bytes = payload.len(), "payload built");
    println!("{payload}");
    Ok(())
}

fn cmd_spawn(config: &AppConfig, host: &HostArgs, program: &[String]) -> Result<()> {
    let (payload, sentinel) = build_payload(config, host)?;
    let (cmd, args) = program
        .split_first()
        .ok_or_else(|| eyre!("no program given to spawn"))?;

    info!(%sentinel, program = %cmd, var = %config.channel.env_var, "spawning embed");
    let status = Process::new(cmd)
        .args(args)
        .env(&config.channel.env_var, payload)
        .status()
        .map_err(|e| eyre!("failed to run '{cmd}': {e}"))?;

    if !status.success() {
        return Err(eyre!("embed '{cmd}' exited with {status}"));
    }
    Ok(())
}

fn cmd_inspect(config: &AppConfig, payload: Option<String>, stdin: bool) -> Result<()> {
    Mode::install(config.mode.clone())?;

    let metadata: Arc<ContextMetadata> = match (payload, stdin) {
        (Some(payload), _) => ContextMetadata::from_string(&payload).into(),
        (None, true) => {
            let mut payload = String::new();
            std::io::stdin().read_to_string(&mut payload)?;
            ContextMetadata::from_string(payload.trim_end()).into()
        }
        (None, false) => {
            debug!(var = %config.channel.env_var, "reading process channel");
            FrameChannel::init_process(&config.channel.env_var)?;
            ContextMetadata::from_process_channel()
        }
    };

    println!("{}", serde_json::to_string_pretty(&inspect_report(&metadata))?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config at {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run the context builder against the selected element and encode the bundle.
fn build_payload(config: &AppConfig, host: &HostArgs) -> Result<(String, Sentinel)> {
    let document = HtmlDocument::load(&host.html)?;
    let element = document.select(&host.selector)?;

    let source = host.source_url.as_deref().unwrap_or(&host.location);
    let source_url = Url::parse(source).map_err(|e| eyre!("invalid source URL '{source}': {e}"))?;

    let mut window = StaticWindow::new(host.location.clone());
    if let Some(parent) = &host.parent_location {
        window = window.with_parent(StaticWindow::new(parent.clone()));
    }

    let services = PageServices::new(&document, config)
        .with_source_url(source_url)
        .with_referrer(host.referrer.clone())
        .with_visibility(!host.hidden);

    let sentinel = host
        .sentinel
        .clone()
        .map(Sentinel::new)
        .unwrap_or_else(Sentinel::generate);

    let seed = (!host.attrs.is_empty()).then(|| {
        host.attrs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<AttributeMap>()
    });

    let embed_type = host.embed_type.clone().or_else(|| element.attribute("type"));
    let bundle: ContextBundle = ContextBuilder::new(&config.runtime).build_bundle(
        embed_type,
        &window,
        &element,
        &services,
        &sentinel,
        seed,
    );

    Ok((bundle.encode()?, sentinel))
}

/// Everything the embed can read, as one JSON document.
fn inspect_report(metadata: &ContextMetadata) -> Value {
    let status = match metadata.parse_status() {
        ParseStatus::Decoded => "decoded",
        ParseStatus::Fallback => "fallback",
    };
    json!({
        "status": status,
        "type": metadata.embed_type(),
        "location": metadata.location().map(String::from),
        "sentinel": metadata.sentinel_optional(),
        "contextState": metadata.context_state(),
        "config": metadata.runtime_config(),
        "attributes": metadata.attribute_data(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_parsing() {
        assert_eq!(
            parse_key_value("data-slot=/1234/top").unwrap(),
            ("data-slot".to_string(), "/1234/top".to_string())
        );
        assert_eq!(parse_key_value("empty=").unwrap().1, "");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn build_args_parse() {
        let cli = Cli::try_parse_from([
            "framecontext",
            "build",
            "--html",
            "page.html",
            "--location",
            "https://host.example/page",
            "--attr",
            "data-slot=/1/top",
            "--type",
            "doubleclick",
        ])
        .expect("parse");
        match cli.command {
            Command::Build { host } => {
                assert_eq!(host.selector, "amp-ad");
                assert_eq!(host.embed_type.as_deref(), Some("doubleclick"));
                assert_eq!(host.attrs.len(), 1);
                assert!(!host.hidden);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn spawn_requires_program() {
        let result = Cli::try_parse_from([
            "framecontext",
            "spawn",
            "--html",
            "page.html",
            "--location",
            "https://host.example/",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn payload_from_fixture_page_round_trips() {
        let host = HostArgs {
            html: PathBuf::from("../../fixtures/html/embed.html"),
            selector: "amp-ad".into(),
            location: "https://host.example/page".into(),
            parent_location: None,
            source_url: None,
            referrer: Some("https://search.example/".into()),
            hidden: false,
            sentinel: Some("abc123".into()),
            embed_type: None,
            attrs: vec![("data-extra".into(), "1".into())],
        };
        let (payload, sentinel) = build_payload(&AppConfig::default(), &host).expect("build");
        assert_eq!(sentinel.as_str(), "abc123");

        let meta = ContextMetadata::from_string_in_mode(&payload, &Mode::test());
        assert_eq!(meta.parse_status(), ParseStatus::Decoded);
        assert_eq!(meta.embed_type(), Some("doubleclick"));
        assert_eq!(meta.sentinel_optional().map(Sentinel::as_str), Some("abc123"));
        assert_eq!(meta.attribute_data()["data-extra"], "1");

        let report = inspect_report(&meta);
        assert_eq!(report["status"], "decoded");
        assert_eq!(report["location"], "https://host.example/page");
        assert_eq!(report["contextState"]["referrer"], "https://search.example/");
    }

    #[test]
    fn report_for_fallback() {
        let meta = ContextMetadata::from_string_in_mode("", &Mode::test());
        let report = inspect_report(&meta);
        assert_eq!(report["status"], "fallback");
        assert_eq!(report["type"], Value::Null);
        assert_eq!(report["attributes"], json!({}));
        assert_eq!(report["contextState"]["sentinel"], Value::Null);
    }
}
