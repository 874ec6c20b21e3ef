//! Binary entry point for `mlq`, a query runner over JSON library dumps.
#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use medialib::{
    Collection, ErrorWithCode, Medialib, MedialibConfig, MedialibError, Result, Scalar, Session,
};
use serde_json::{Map, Value as Json};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mlq",
    version,
    about = "Run a media library fetch spec against a JSON library dump"
)]
struct Cli {
    #[arg(long, env = "MLQ_CONFIG", help = "Path to a medialib TOML config")]
    config: Option<PathBuf>,

    #[arg(long, help = "JSON array of entries to import before querying")]
    library: PathBuf,

    #[arg(long, help = "Collection as JSON; defaults to the whole library")]
    collection: Option<String>,

    #[arg(help = "Fetch spec as JSON")]
    fetch: String,
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {}", ErrorWithCode(&err));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MedialibConfig::load_or_default(cli.config.as_deref())?;
    let lib = Medialib::open(config)?;

    let mut session = lib.begin_write();
    let imported = import(&mut session, &cli.library, &lib.config().default_source)?;
    session.commit()?;
    info!(entries = imported, path = %cli.library.display(), "library imported");

    let collection = match cli.collection.as_deref() {
        Some(text) => serde_json::from_str::<Collection>(text)?,
        None => Collection::universe(),
    };
    let fetch: Json = serde_json::from_str(&cli.fetch)?;
    let result = lib.query(&collection, &fetch)?;
    let rendered = match result {
        Some(value) => serde_json::to_string_pretty(&value)?,
        None => "null".to_owned(),
    };
    println!("{rendered}");
    Ok(())
}

/// Loads `[{"url": ..., "<key>": value | {"<source>": value}}, ...]`.
fn import(session: &mut Session<'_>, path: &Path, default_source: &str) -> Result<usize> {
    let text = fs::read_to_string(path)?;
    let Json::Array(items) = serde_json::from_str::<Json>(&text)? else {
        return Err(MedialibError::invalid("library must be a JSON array"));
    };
    for (index, item) in items.iter().enumerate() {
        let Json::Object(fields) = item else {
            return Err(MedialibError::invalid(format!(
                "library entry {index} must be an object"
            )));
        };
        let url = fields
            .get("url")
            .and_then(Json::as_str)
            .ok_or_else(|| MedialibError::invalid(format!("library entry {index} has no url")))?;
        let id = session.entry_new(url)?;
        for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != "url") {
            match value {
                Json::Object(by_source) => set_sourced(session, id, key, by_source)?,
                other => set_property(session, id, key, default_source, other)?,
            }
        }
    }
    Ok(items.len())
}

fn set_sourced(session: &mut Session<'_>, id: i32, key: &str, by_source: &Map<String, Json>) -> Result<()> {
    for (source, value) in by_source {
        set_property(session, id, key, source, value)?;
    }
    Ok(())
}

fn set_property(session: &mut Session<'_>, id: i32, key: &str, source: &str, value: &Json) -> Result<()> {
    match scalar(value) {
        Some(Scalar::Int(n)) => session.property_set_int(id, key, n, source),
        Some(Scalar::Str(s)) => session.property_set_str(id, key, &s, source),
        None => Err(MedialibError::invalid(format!(
            "property '{key}' must be a 32-bit integer or a string"
        ))),
    }
}

fn scalar(value: &Json) -> Option<Scalar> {
    match value {
        Json::String(s) => Some(Scalar::Str(s.clone())),
        Json::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Scalar::Int),
        _ => None,
    }
}
