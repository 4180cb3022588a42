use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use video_script_gen::{Config, Dispatcher, LlmClient, ProviderConfig, ScriptOutcome};

fn cli() -> Command {
    Command::new("video-script-gen")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Generate video scripts and stock-footage search terms with any configured LLM")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to the standard search paths)")
                .global(true),
        )
        .arg(
            Arg::new("provider")
                .short('p')
                .long("provider")
                .value_name("ID")
                .help("Override llm_provider from the configuration")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("script")
                .about("Generate a video script for a subject")
                .arg(
                    Arg::new("subject")
                        .short('s')
                        .long("subject")
                        .value_name("TEXT")
                        .required(true),
                )
                .arg(
                    Arg::new("language")
                        .short('l')
                        .long("language")
                        .value_name("LANG")
                        .help("Target language, e.g. en-US"),
                )
                .arg(
                    Arg::new("paragraphs")
                        .short('n')
                        .long("paragraphs")
                        .value_name("NUM")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("1"),
                ),
        )
        .subcommand(
            Command::new("terms")
                .about("Generate stock-footage search terms for a script")
                .arg(
                    Arg::new("subject")
                        .short('s')
                        .long("subject")
                        .value_name("TEXT")
                        .required(true),
                )
                .arg(
                    Arg::new("script")
                        .long("script")
                        .value_name("TEXT")
                        .conflicts_with("script-file")
                        .required_unless_present("script-file"),
                )
                .arg(
                    Arg::new("script-file")
                        .short('f')
                        .long("script-file")
                        .value_name("FILE"),
                )
                .arg(
                    Arg::new("amount")
                        .short('a')
                        .long("amount")
                        .value_name("NUM")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("5"),
                ),
        )
        .subcommand(Command::new("providers").about("List supported provider ids"))
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(provider) = matches.get_one::<String>("provider") {
        config.app.llm_provider = provider.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let filter = if matches.get_flag("verbose") {
        "video_script_gen=debug,warn"
    } else {
        "video_script_gen=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(("providers", _)) = matches.subcommand() {
        for id in Dispatcher::new().registry().providers() {
            println!("{}", id);
        }
        return Ok(());
    }

    let config = load_config(&matches)?;
    let provider_config: ProviderConfig = config.provider_config()?;
    info!("🚀 Using {} provider", provider_config.provider);

    let client = LlmClient::new(Arc::new(Dispatcher::new()), provider_config);

    match matches.subcommand() {
        Some(("script", sub)) => {
            let subject = sub.get_one::<String>("subject").map(String::as_str).unwrap_or_default();
            let language = sub.get_one::<String>("language").map(String::as_str);
            let paragraphs = sub.get_one::<u32>("paragraphs").copied().unwrap_or(1);

            match client.generate_script(subject, language, paragraphs).await {
                ScriptOutcome::Generated(script) => println!("{}", script),
                outcome => {
                    let text = outcome.into_text();
                    error!("❌ Script generation did not succeed");
                    if text.is_empty() {
                        bail!("script generation failed: every attempt was empty");
                    }
                    bail!("script generation failed: {}", text);
                }
            }
        }
        Some(("terms", sub)) => {
            let subject = sub.get_one::<String>("subject").map(String::as_str).unwrap_or_default();
            let script = match sub.get_one::<String>("script-file") {
                Some(path) => tokio::fs::read_to_string(path).await?,
                None => sub.get_one::<String>("script").cloned().unwrap_or_default(),
            };
            let amount = sub.get_one::<u32>("amount").copied().unwrap_or(5);

            let terms = client.generate_terms(subject, &script, amount).await?;
            if terms.is_empty() {
                bail!("no search terms generated for '{}'", subject);
            }
            println!("{}", serde_json::to_string_pretty(&terms)?);
        }
        _ => bail!("no command given, see --help"),
    }

    Ok(())
}
