use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kvmap",
    about = "Store and query JSON documents in a schemaless key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Snapshot file holding the datastore
    #[arg(long, global = true, default_value = "kvmap.json")]
    pub data: PathBuf,

    /// Adapter configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Insert a document; the store assigns an id unless the document has one
    Create(DocumentArgs),
    /// Overwrite the document stored under an id
    Update(UpdateArgs),
    /// Create or update depending on whether the document carries an id
    Upsert(DocumentArgs),
    /// Show one document
    Get(IdArgs),
    /// Delete one document
    Delete(IdArgs),
    /// Show the document with the smallest key
    First(CollectionArgs),
    /// Show the document with the largest key
    Last(CollectionArgs),
    /// Query a collection
    List(ListArgs),
}

impl Command {
    pub fn collection(&self) -> &str {
        match self {
            Command::Create(args) | Command::Upsert(args) => &args.collection,
            Command::Update(args) => &args.collection,
            Command::Get(args) | Command::Delete(args) => &args.collection,
            Command::First(args) | Command::Last(args) => &args.collection,
            Command::List(args) => &args.collection,
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Create(_) | Command::Update(_) | Command::Upsert(_) | Command::Delete(_)
        )
    }
}

#[derive(Args)]
pub struct CollectionArgs {
    pub collection: String,
}

#[derive(Args)]
pub struct DocumentArgs {
    pub collection: String,
    /// Document as a JSON object
    pub document: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub collection: String,
    pub id: String,
    /// Document as a JSON object
    pub document: String,
}

#[derive(Args)]
pub struct IdArgs {
    pub collection: String,
    pub id: String,
}

#[derive(Args)]
pub struct ListArgs {
    pub collection: String,
    /// Filter as `prop<op>value` with op one of = != < <= > >=
    #[arg(long = "filter")]
    pub filters: Vec<String>,
    #[arg(long)]
    pub order: Option<String>,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub offset: Option<usize>,
}
