use clap::{Parser, Subcommand, ValueEnum};
use rowsearch::backend::BackendKind;
use rowsearch::query::{SortOrder, SortSpec, SortType};
use rowsearch::{Bookmark, ExportRequest, Row, SearchParams, SearchQuery, TableProvider, Workspace};
use std::process;

/// rowsearch CLI: search tables and export views from a data directory
#[derive(Parser)]
#[command(name = "rowsearch", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, ValueEnum)]
enum OrderArg {
    Ascending,
    Descending,
}

#[derive(Clone, ValueEnum)]
enum SortTypeArg {
    String,
    Number,
}

#[derive(Subcommand)]
enum Command {
    /// Search the rows of a table
    Search {
        /// Table ID
        table: String,
        /// Query predicates as JSON (e.g. '{"string":{"name":"Al"}}')
        #[arg(long)]
        query: Option<String>,
        /// Page size
        #[arg(long)]
        limit: Option<u64>,
        /// Return a bookmark for the next page
        #[arg(long)]
        paginate: bool,
        /// Bookmark returned by a previous page
        #[arg(long)]
        bookmark: Option<String>,
        /// Column to sort by
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value = "ascending")]
        order: OrderArg,
        #[arg(long, default_value = "string")]
        sort_type: SortTypeArg,
    },

    /// Export a view as CSV or JSON
    Export {
        /// View name (all_<tableId> exports every row of a table)
        view: String,
        /// csv or json
        #[arg(long)]
        export_format: Option<String>,
        /// Table to read when the view is not a saved view
        #[arg(long)]
        table_id: Option<String>,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<String>,
    },

    /// Show a table's schema including related columns
    Schema {
        /// Table ID
        table: String,
    },

    /// Import rows from a JSON array file
    Import {
        /// Table ID
        table: String,
        /// Path to a JSON file holding an array of row objects
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = Workspace::open(&cli.data_dir)?;

    match cli.command {
        Command::Search {
            table,
            query,
            limit,
            paginate,
            bookmark,
            sort,
            order,
            sort_type,
        } => {
            let query: SearchQuery = match query {
                Some(json) => serde_json::from_str(&json)
                    .map_err(|e| format!("Invalid --query JSON: {e}"))?,
                None => SearchQuery::default(),
            };
            let kind = BackendKind::for_table(&workspace.catalog().get_table(&table)?);
            let params = SearchParams {
                query,
                paginate,
                bookmark: bookmark.map(|raw| parse_bookmark(kind, raw)),
                limit,
                sort: sort.map(|column| SortSpec {
                    column,
                    order: match order {
                        OrderArg::Ascending => SortOrder::Ascending,
                        OrderArg::Descending => SortOrder::Descending,
                    },
                    sort_type: match sort_type {
                        SortTypeArg::String => SortType::String,
                        SortTypeArg::Number => SortType::Number,
                    },
                }),
            };
            let result = workspace.engine().search(&table, params)?;
            print_output(&serde_json::to_value(result)?, &cli.format)?;
        }

        Command::Export {
            view,
            export_format,
            table_id,
            out,
        } => {
            let file = workspace.engine().export_view(&ExportRequest {
                view,
                format: export_format,
                table_id,
            })?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &file.body)
                        .map_err(|e| format!("Failed to write '{path}': {e}"))?;
                    print_output(
                        &serde_json::json!({ "ok": true, "file": path, "name": file.filename }),
                        &cli.format,
                    )?;
                }
                None => println!("{}", file.body),
            }
        }

        Command::Schema { table } => {
            let schema = workspace.engine().enriched_schema(&table)?;
            print_output(&serde_json::to_value(schema)?, &cli.format)?;
        }

        Command::Import { table, file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| format!("Failed to read '{file}': {e}"))?;
            let rows: Vec<Row> = serde_json::from_str(&content)
                .map_err(|e| format!("'{file}' must hold a JSON array of objects: {e}"))?;
            let ids = workspace.import_rows(&table, &rows)?;
            print_output(
                &serde_json::json!({ "ok": true, "imported": rows.len(), "ids": ids }),
                &cli.format,
            )?;
        }
    }

    Ok(())
}

/// Relational tables page by number; document tables take the token as is.
fn parse_bookmark(kind: BackendKind, raw: String) -> Bookmark {
    match (kind, raw.parse::<u64>()) {
        (BackendKind::Relational, Ok(page)) => Bookmark::Page(page),
        _ => Bookmark::Token(raw),
    }
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
