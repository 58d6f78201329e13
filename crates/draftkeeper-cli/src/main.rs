use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use draftkeeper_core::prelude::*;
use draftkeeper_core::PersistenceClient;
use draftkeeper_rest::{RestConfig, RestPersistenceClient};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("draftkeeper")
        .version(draftkeeper_core::VERSION)
        .about("Draft persistence for content editors")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Editor config file (TOML)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run an editing session against an in-memory store")
                .arg(
                    Arg::new("edits")
                        .long("edits")
                        .default_value("200")
                        .value_parser(value_parser!(u32))
                        .help("Number of random edits"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("40")
                        .value_parser(value_parser!(u64))
                        .help("Store latency per request"),
                )
                .arg(
                    Arg::new("fail-every")
                        .long("fail-every")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Fail every n-th request (0 disables)"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_parser(value_parser!(u64))
                        .help("Autosave interval, overrides the config file"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                ),
        )
        .subcommand(
            Command::new("push")
                .about("Save a document snapshot once through the REST API")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot as JSON"),
                )
                .arg(
                    Arg::new("rest-url")
                        .long("rest-url")
                        .required(true)
                        .help("REST API root, e.g. https://example.com/wp-json/"),
                )
                .arg(
                    Arg::new("nonce")
                        .long("nonce")
                        .default_value("")
                        .help("Value for the X-WP-Nonce header"),
                )
                .arg(
                    Arg::new("publish")
                        .long("publish")
                        .action(ArgAction::SetTrue)
                        .help("Publish instead of saving"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("Config file to read instead of --config"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config_path = matches.get_one::<PathBuf>("config").cloned();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = load_config(config_path.as_ref())?;
            let report = simulate(args, config).await?;
            println!("{report}");
            std::process::exit(if report.dirty { 1 } else { 0 });
        }
        Some(("push", args)) => push(args, load_config(config_path.as_ref())?).await,
        Some(("config", args)) => {
            let path = args.get_one::<PathBuf>("file").cloned().or(config_path);
            let config = load_config(path.as_ref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EditorConfig> {
    let config = match path {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EditorConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

struct SimulationReport {
    edits: u32,
    requests: usize,
    persisted: usize,
    queued: usize,
    failed: usize,
    autosave_ticks: u64,
    status: SaveStatus,
    post_status: PostStatus,
    dirty: bool,
    store_matches: bool,
}

impl std::fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Simulation Report")?;
        writeln!(f, "=================")?;
        writeln!(f, "  Edits:            {}", self.edits)?;
        writeln!(f, "  Requests sent:    {}", self.requests)?;
        writeln!(f, "  Saves persisted:  {}", self.persisted)?;
        writeln!(f, "  Saves queued:     {}", self.queued)?;
        writeln!(f, "  Saves failed:     {}", self.failed)?;
        writeln!(f, "  Autosave ticks:   {}", self.autosave_ticks)?;
        writeln!(f, "  Final status:     {:?}", self.status)?;
        writeln!(f, "  Post status:      {}", self.post_status)?;
        writeln!(f, "  Store up to date: {}", self.store_matches)?;
        write!(f, "  Dirty:            {}", self.dirty)
    }
}

async fn simulate(args: &ArgMatches, mut config: EditorConfig) -> Result<SimulationReport> {
    let edits: u32 = arg(args, "edits")?;
    let latency = Duration::from_millis(arg(args, "latency-ms")?);
    let fail_every: u64 = arg(args, "fail-every")?;
    let seed: u64 = arg(args, "seed")?;
    if let Some(ms) = args.get_one::<u64>("interval-ms") {
        config = config.with_autosave_interval(Duration::from_millis(*ms));
        config.validate()?;
    }

    tracing::info!(edits, ?latency, fail_every, seed, "starting simulation");

    let store = Arc::new(
        MemoryStore::new()
            .with_latency(latency)
            .with_failure_every(fail_every),
    );
    let guards = Arc::new(GuardRegistry::new());
    let snapshot = PostFields {
        title: "Untitled".to_string(),
        rest_base: Some("posts".to_string()),
        ..PostFields::default()
    };

    let session = EditorSession::start(store.clone(), snapshot, &config, guards.clone());
    let doc = session.coordinator().clone();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut saves = Vec::new();

    for i in 0..edits {
        let roll = rng.gen_range(0..5u8);
        doc.mutate(|f| match roll {
            0 => f.title = format!("Draft {seed}-{i}"),
            1 => f.content.push_str(&format!("<p>paragraph {i}</p>")),
            2 => f.excerpt = format!("Edit number {i}"),
            3 => f.tags.push(u64::from(i % 7)),
            _ => f.lexical_state = format!("{{\"root\":{{\"children\":{i}}}}}"),
        });

        if i == edits / 2 {
            let doc = doc.clone();
            saves.push(tokio::spawn(async move { doc.publish().await }));
        } else if rng.gen_bool(0.2) {
            let doc = doc.clone();
            saves.push(tokio::spawn(async move { doc.save(FieldOverrides::new()).await }));
        }

        let pause = rng.gen_range(0..=u64::try_from(latency.as_millis()).unwrap_or(u64::MAX / 2) * 2);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    let mut persisted = 0;
    let mut queued = 0;
    let mut failed = 0;
    for result in futures::future::join_all(saves).await {
        match result.context("save task panicked")? {
            Ok(SaveOutcome::Persisted(_)) => persisted += 1,
            Ok(SaveOutcome::Queued) => queued += 1,
            Err(e) => {
                tracing::debug!(error = %e, "manual save failed");
                failed += 1;
            }
        }
    }

    let autosave_ticks = session.autosave_ticks();
    let doc = session.close();
    let flushed = flush(&doc, 5).await;
    if !flushed {
        tracing::warn!(session = %doc.session_id(), "document still dirty after final flush");
    }

    let fields = doc.fields();
    let store_matches = fields
        .id
        .and_then(|id| store.stored_body("posts", id))
        .is_some_and(|body| body.title == fields.title && body.content == fields.content);

    Ok(SimulationReport {
        edits,
        requests: store.request_count(),
        persisted,
        queued,
        failed,
        autosave_ticks,
        status: doc.status(),
        post_status: fields.status,
        dirty: doc.is_dirty(),
        store_matches,
    })
}

/// Save until clean or out of attempts
async fn flush(doc: &SaveCoordinator, attempts: u32) -> bool {
    for _ in 0..attempts {
        wait_idle(doc).await;
        if !doc.is_dirty() {
            return true;
        }
        if let Err(e) = doc.save(FieldOverrides::new()).await {
            tracing::warn!(error = %e, "flush attempt failed");
        }
    }
    wait_idle(doc).await;
    !doc.is_dirty()
}

async fn wait_idle(doc: &SaveCoordinator) {
    let mut status = doc.subscribe_status();
    let _ = status.wait_for(|_| !doc.is_saving()).await;
}

async fn push(args: &ArgMatches, config: EditorConfig) -> Result<()> {
    let file: PathBuf = arg(args, "file")?;
    let rest_url: String = arg(args, "rest-url")?;
    let nonce: String = arg(args, "nonce")?;

    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let snapshot: PostFields =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;

    let client: Arc<dyn PersistenceClient> =
        Arc::new(RestPersistenceClient::new(RestConfig::new(rest_url, nonce))?);
    let doc = SaveCoordinator::new(client, snapshot, &config);

    let outcome = if args.get_flag("publish") {
        doc.publish().await?
    } else {
        doc.save(FieldOverrides::new()).await?
    };

    let Some(confirmed) = outcome.persisted() else {
        bail!("save was queued unexpectedly");
    };
    println!("{}", serde_json::to_string_pretty(confirmed)?);
    Ok(())
}
