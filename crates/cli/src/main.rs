mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use deckhand_engine::{
    ArtifactCache, DryRunInvoker, InMemoryArtifacts, Namespace, PlaybookEntry, Sequencer, StateStore, count_instructions,
    parse_inputs_file, parse_playbook_file, parse_state_file,
};
use deckhand_types::Value;
use tracing::{info, warn};

use crate::config::{CONFIG_PATH_ENV, load_config};

/// Artifact directory used when neither `--artifacts` nor the config names one.
const DEFAULT_ARTIFACT_DIR: &str = "build/contracts";

/// Run declarative smart-contract playbooks against a dry-run chain.
#[derive(Parser, Debug)]
#[command(name = "deckhand", version, about)]
struct Args {
    /// Playbook files, run in the order given
    #[arg(required = true)]
    playbooks: Vec<PathBuf>,

    /// YAML or JSON mapping loaded into `$inputs`
    #[arg(long, short)]
    inputs: Option<PathBuf>,

    /// State dump from an earlier run to resume from
    #[arg(long)]
    state: Option<PathBuf>,

    /// Directory of compiled contract artifacts
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Pause between instructions, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Write selected state here after the run (YAML for .yml/.yaml, JSON otherwise)
    #[arg(long)]
    dump_state: Option<PathBuf>,

    /// State reference to include in the dump; repeatable
    #[arg(long = "dump-path")]
    dump_paths: Vec<String>,

    /// Configuration file
    #[arg(long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Print the number of instructions the playbooks would run and exit
    #[arg(long)]
    count_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("failed to load configuration")?;
    let settings = config.with_flags(args.delay_ms, args.artifacts.clone(), args.dump_paths.clone());

    let mut state = match &args.state {
        Some(path) => parse_state_file(path)?,
        None => StateStore::new(),
    };
    if let Some(path) = &args.inputs {
        state.set(Namespace::Inputs, "", Value::Object(parse_inputs_file(path)?))?;
    }

    let entries = args
        .playbooks
        .iter()
        .map(|path| parse_playbook_file(path).map(PlaybookEntry::Nested))
        .collect::<Result<Vec<_>, _>>()?;

    if args.count_only {
        println!("{}", count_instructions(&entries, &state)?);
        return Ok(());
    }

    let artifacts = load_artifacts(settings.artifacts.as_deref())?;
    let sequencer =
        Sequencer::new(Arc::new(DryRunInvoker::new()), ArtifactCache::new(Arc::new(artifacts))).with_options(settings.run);

    let outcome = tokio::select! {
        outcome = sequencer.run(&entries, &mut state) => outcome.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Err(anyhow!("interrupted")),
    };

    // State is dumped even when the run fails so completed deployments are kept.
    if let Some(path) = &args.dump_state {
        dump_state(&state, &settings.dump_paths, path).await?;
    }

    let results = outcome?;
    println!("{}", serde_json::to_string_pretty(&results.to_json())?);
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_artifacts(directory: Option<&Path>) -> Result<InMemoryArtifacts> {
    if let Some(directory) = directory {
        return InMemoryArtifacts::load_dir(directory);
    }
    let fallback = Path::new(DEFAULT_ARTIFACT_DIR);
    if fallback.is_dir() {
        return InMemoryArtifacts::load_dir(fallback);
    }
    warn!(directory = DEFAULT_ARTIFACT_DIR, "no artifact directory found; only link and at calls will resolve");
    Ok(InMemoryArtifacts::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DumpFormat {
    Json,
    Yaml,
}

impl DumpFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("yml") || extension.eq_ignore_ascii_case("yaml") => {
                DumpFormat::Yaml
            }
            _ => DumpFormat::Json,
        }
    }
}

fn render_state(state: &StateStore, references: &[String], format: DumpFormat) -> Result<String> {
    let selected = state.select(references)?.to_json();
    let rendered = match format {
        DumpFormat::Json => serde_json::to_string_pretty(&selected)?,
        DumpFormat::Yaml => serde_yaml::to_string(&selected)?,
    };
    Ok(rendered)
}

async fn dump_state(state: &StateStore, references: &[String], path: &Path) -> Result<()> {
    let rendered = render_state(state, references, DumpFormat::for_path(path))?;
    tokio::fs::write(path, rendered)
        .await
        .with_context(|| format!("failed to write state dump {}", path.display()))?;
    info!(path = %path.display(), references = ?references, "state dumped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state() -> StateStore {
        StateStore::from_value(Value::from(json!({
            "inputs": {"owner": "0xabc"},
            "deployed": {"token": {"address": "0x01"}},
            "outputs": {"tx": "0xff"}
        })))
        .expect("state")
    }

    #[test]
    fn test_dump_format_follows_extension() {
        assert_eq!(DumpFormat::for_path(Path::new("state.yml")), DumpFormat::Yaml);
        assert_eq!(DumpFormat::for_path(Path::new("state.YAML")), DumpFormat::Yaml);
        assert_eq!(DumpFormat::for_path(Path::new("state.json")), DumpFormat::Json);
        assert_eq!(DumpFormat::for_path(Path::new("state")), DumpFormat::Json);
    }

    #[test]
    fn test_render_selected_state() {
        let state = sample_state();
        let rendered = render_state(&state, &["$deployed".to_string()], DumpFormat::Json).expect("render");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("json");
        assert_eq!(parsed, json!({"deployed": {"token": {"address": "0x01"}}}));

        let rendered = render_state(&state, &["$outputs.tx".to_string()], DumpFormat::Yaml).expect("render");
        let parsed: serde_json::Value = serde_yaml::from_str(&rendered).expect("yaml");
        assert_eq!(parsed, json!({"outputs": {"tx": "0xff"}}));
    }

    #[tokio::test]
    async fn test_dump_state_round_trips_through_loader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.yml");
        let state = sample_state();
        dump_state(&state, &["$deployed".to_string(), "$inputs".to_string()], &path)
            .await
            .expect("dump");

        let restored = parse_state_file(&path).expect("reload");
        assert_eq!(restored.get(Namespace::Deployed, "token.address"), Some(&Value::from("0x01")));
        assert_eq!(restored.get(Namespace::Inputs, "owner"), Some(&Value::from("0xabc")));
        assert!(restored.get(Namespace::Outputs, "tx").is_none());
    }

    #[test]
    fn test_missing_artifact_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_artifacts(Some(&dir.path().join("absent"))).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "deckhand",
            "deploy.yml",
            "--inputs",
            "inputs.yml",
            "--dump-path",
            "$deployed",
            "--dump-path",
            "$outputs.tx",
            "--delay-ms",
            "100",
        ])
        .expect("args");
        assert_eq!(args.playbooks, vec![PathBuf::from("deploy.yml")]);
        assert_eq!(args.dump_paths, vec!["$deployed", "$outputs.tx"]);
        assert_eq!(args.delay_ms, Some(100));
        assert!(!args.count_only);

        assert!(Args::try_parse_from(["deckhand"]).is_err());
    }
}
