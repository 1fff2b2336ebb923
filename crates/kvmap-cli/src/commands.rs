use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use kvmap_adapter::{Adapter, AdapterConfig, Query};
use kvmap_mapper::{json_to_value, Document, SerdeMapping};
use kvmap_store::{FilterOp, InMemoryDatastore, StoreClient};
use kvmap_types::{EntityId, Value};
use serde_json::Value as Json;
use tracing::debug;

use crate::cli::*;

/// Result of one command, rendered after the snapshot is written.
pub enum Output {
    Saved(Document),
    Found(Option<Document>),
    Deleted { collection: String, id: EntityId },
    Listed(Vec<Document>),
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format.clone();
    let output = execute(cli)?;
    render(&output, &format)
}

struct Workspace {
    store: Arc<InMemoryDatastore>,
    adapter: Adapter,
    data: PathBuf,
}

impl Workspace {
    fn open(data: &Path, config: Option<&Path>, collection: &str) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => AdapterConfig::load(path)?,
            None => AdapterConfig::default(),
        };
        let store = Arc::new(
            InMemoryDatastore::open_snapshot(data)
                .with_context(|| format!("opening {}", data.display()))?,
        );
        let client: Arc<dyn StoreClient> = store.clone();
        let adapter = Adapter::builder(client)
            .register::<Document, _>(collection, SerdeMapping::new(collection))?
            .config(config)
            .build()?;
        debug!(data = %data.display(), records = store.len(), "workspace opened");
        Ok(Self {
            store,
            adapter,
            data: data.to_path_buf(),
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        self.store
            .save_snapshot(&self.data)
            .with_context(|| format!("writing {}", self.data.display()))
    }
}

pub fn execute(cli: Cli) -> anyhow::Result<Output> {
    let collection = cli.command.collection().to_string();
    let workspace = Workspace::open(&cli.data, cli.config.as_deref(), &collection)?;
    let adapter = &workspace.adapter;
    let mutating = cli.command.is_mutating();

    let output = match cli.command {
        Command::Create(args) => {
            let doc = parse_document(&args.document)?;
            Output::Saved(adapter.create(&collection, doc)?)
        }
        Command::Update(args) => {
            let mut doc = parse_document(&args.document)?;
            doc.id = Some(parse_id(&args.id)?);
            Output::Saved(adapter.update(&collection, doc)?)
        }
        Command::Upsert(args) => {
            let doc = parse_document(&args.document)?;
            Output::Saved(adapter.persist(&collection, doc)?)
        }
        Command::Get(args) => Output::Found(adapter.find(&collection, &parse_id(&args.id)?)?),
        Command::Delete(args) => {
            let id = parse_id(&args.id)?;
            adapter.command::<Document>(&collection)?.delete_by_id(&id)?;
            Output::Deleted { collection, id }
        }
        Command::First(_) => Output::Found(adapter.first(&collection)?),
        Command::Last(_) => Output::Found(adapter.last(&collection)?),
        Command::List(args) => Output::Listed(list(adapter, &collection, &args)?),
    };

    if mutating {
        workspace.save()?;
    }
    Ok(output)
}

fn list(adapter: &Adapter, collection: &str, args: &ListArgs) -> anyhow::Result<Vec<Document>> {
    let mut query: Query<'_, Document> = adapter.query(collection)?;
    for filter in &args.filters {
        let (property, op, value) = parse_filter(filter)?;
        query = query.filter(&property, op, value);
    }
    if let Some(order) = &args.order {
        query = if args.desc {
            query.order_desc(order)
        } else {
            query.order(order)
        };
    } else if args.desc {
        query = query.order_desc(Query::<Document>::KEY);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    Ok(query.to_vec()?)
}

fn parse_id(text: &str) -> anyhow::Result<EntityId> {
    text.parse::<EntityId>()
        .with_context(|| format!("invalid id '{text}'"))
}

fn parse_document(text: &str) -> anyhow::Result<Document> {
    let json: Json = serde_json::from_str(text).context("document is not valid JSON")?;
    if !json.is_object() {
        bail!("document must be a JSON object");
    }
    Ok(Document::from_json(json)?)
}

const OPERATORS: [&str; 7] = ["!=", "<=", ">=", "==", "=", "<", ">"];

/// Split `prop<op>value`. The value is read as JSON when it parses, as a
/// plain string otherwise.
fn parse_filter(text: &str) -> anyhow::Result<(String, FilterOp, Value)> {
    let start = text
        .find(['=', '!', '<', '>'])
        .ok_or_else(|| anyhow!("filter '{text}' has no operator"))?;
    let (property, rest) = text.split_at(start);
    if property.is_empty() {
        bail!("filter '{text}' has no property");
    }
    let spelling = OPERATORS
        .iter()
        .find(|op| rest.starts_with(**op))
        .ok_or_else(|| anyhow!("filter '{text}' has an unknown operator"))?;
    let op = FilterOp::parse(spelling).ok_or_else(|| anyhow!("unknown operator {spelling}"))?;

    let raw = &rest[spelling.len()..];
    let json = serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string()));
    Ok((property.to_string(), op, json_to_value(property, json)?))
}

fn render(output: &Output, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let json = match output {
                Output::Saved(doc) | Output::Found(Some(doc)) => doc.to_json(),
                Output::Found(None) => Json::Null,
                Output::Deleted { id, .. } => serde_json::json!({ "deleted": id }),
                Output::Listed(docs) => Json::Array(docs.iter().map(Document::to_json).collect()),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => match output {
            Output::Saved(doc) => {
                println!("{} Saved {}", "✓".green().bold(), id_label(doc).yellow());
                println!("  {}", Json::Object(doc.attributes.clone()));
            }
            Output::Found(Some(doc)) => {
                println!("{}  {}", id_label(doc).yellow().bold(), Json::Object(doc.attributes.clone()));
            }
            Output::Found(None) => println!("{}", "Not found.".dimmed()),
            Output::Deleted { collection, id } => {
                println!("{} Deleted {}/{}", "✓".green().bold(), collection, id.to_string().yellow());
            }
            Output::Listed(docs) => {
                for doc in docs {
                    println!("{}  {}", id_label(doc).yellow(), Json::Object(doc.attributes.clone()));
                }
                println!("{}", format!("{} document(s)", docs.len()).dimmed());
            }
        },
    }
    Ok(())
}

fn id_label(doc: &Document) -> String {
    doc.id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "?".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    fn run(data: &Path, args: &[&str]) -> Output {
        let mut argv = vec!["kvmap", "--data", data.to_str().unwrap()];
        argv.extend_from_slice(args);
        execute(Cli::try_parse_from(argv).unwrap()).unwrap()
    }

    fn saved(output: Output) -> Document {
        match output {
            Output::Saved(doc) => doc,
            _ => panic!("expected a saved document"),
        }
    }

    fn listed(output: Output) -> Vec<Document> {
        match output {
            Output::Listed(docs) => docs,
            _ => panic!("expected a listing"),
        }
    }

    #[test]
    fn parse_filter_spellings() {
        let (prop, op, value) = parse_filter("size>=2").unwrap();
        assert_eq!(prop, "size");
        assert_eq!(op, FilterOp::GreaterThanOrEqual);
        assert_eq!(value, Value::Integer(2));

        let (_, op, value) = parse_filter("name=Widget A").unwrap();
        assert_eq!(op, FilterOp::Equal);
        assert_eq!(value, Value::from("Widget A"));

        let (_, op, value) = parse_filter("name!=\"x\"").unwrap();
        assert_eq!(op, FilterOp::NotEqual);
        assert_eq!(value, Value::from("x"));

        assert!(parse_filter("size").is_err());
        assert!(parse_filter("=3").is_err());
    }

    #[test]
    fn parse_document_requires_object() {
        assert!(parse_document("[1, 2]").is_err());
        assert!(parse_document("not json").is_err());
        let doc = parse_document(r#"{"id": "w1", "name": "A"}"#).unwrap();
        assert_eq!(doc.id, Some(EntityId::from("w1")));
    }

    #[test]
    fn commands_persist_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("store.json");

        let a = saved(run(&data, &["create", "widgets", r#"{"name": "A", "size": 3}"#]));
        let b = saved(run(&data, &["create", "widgets", r#"{"name": "B", "size": 1}"#]));
        assert!(data.exists());
        let a_id = a.id.clone().unwrap().to_string();

        match run(&data, &["get", "widgets", &a_id]) {
            Output::Found(Some(doc)) => assert_eq!(doc.get("name"), Some(&json!("A"))),
            _ => panic!("expected the created document"),
        }

        match run(&data, &["last", "widgets"]) {
            Output::Found(Some(doc)) => assert_eq!(doc.id, b.id),
            _ => panic!("expected the last document"),
        }

        let hits = listed(run(&data, &["list", "widgets", "--filter", "size>1"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a.id);

        let ordered = listed(run(&data, &["list", "widgets", "--order", "size"]));
        assert_eq!(ordered[0].id, b.id);

        saved(run(&data, &["update", "widgets", &a_id, r#"{"name": "A2"}"#]));
        match run(&data, &["get", "widgets", &a_id]) {
            Output::Found(Some(doc)) => {
                assert_eq!(doc.get("name"), Some(&json!("A2")));
                assert!(doc.get("size").is_none());
            }
            _ => panic!("expected the updated document"),
        }

        run(&data, &["delete", "widgets", &a_id]);
        assert!(matches!(run(&data, &["get", "widgets", &a_id]), Output::Found(None)));
        assert_eq!(listed(run(&data, &["list", "widgets"])).len(), 1);
    }

    #[test]
    fn upsert_uses_embedded_id() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("store.json");
        let doc = saved(run(&data, &["upsert", "notes", r#"{"id": "n1", "text": "hi"}"#]));
        assert_eq!(doc.id, Some(EntityId::from("n1")));
        let found = listed(run(&data, &["list", "notes", "--desc", "--limit", "1"]));
        assert_eq!(found[0].id, Some(EntityId::from("n1")));
    }

    #[test]
    fn read_commands_do_not_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("store.json");
        assert!(matches!(run(&data, &["first", "widgets"]), Output::Found(None)));
        assert!(!data.exists());
    }

    #[test]
    fn strict_config_rejects_update_of_missing_id() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("store.json");
        let config = dir.path().join("kvmap.toml");
        std::fs::write(&config, "strict_update = true").unwrap();

        let cli = Cli::try_parse_from([
            "kvmap",
            "--data",
            data.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "update",
            "widgets",
            "9",
            r#"{"name": "ghost"}"#,
        ])
        .unwrap();
        assert!(execute(cli).is_err());
        assert!(!data.exists());
    }
}
