use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use chainlink_graph::MergeGraph;
use chainlink_merge::MergeEngine;
use chainlink_store::{EntityQuery, EntityRow, SqliteEntityStore, TableSchema};
use chainlink_types::{EntityId, Value};

use crate::cli::*;
use crate::config::ChainlinkConfig;

type RowGraph = MergeGraph<EntityRow, SqliteEntityStore>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        db,
        table,
        config,
        format,
    } = cli;
    let config = ChainlinkConfig::load(config.as_deref())?;
    let store = SqliteEntityStore::open(&db, config.store.clone())
        .with_context(|| format!("opening {}", db.display()))?;

    let command = match command {
        Command::Install => return cmd_install(&store, &table, format),
        Command::Table(command) => command,
    };

    let schema = store
        .describe_table(&table)
        .with_context(|| format!("reading table {table}"))?;
    debug!(table = %table, columns = ?schema.columns, "loaded table schema");
    let graph = MergeGraph::dynamic(Arc::new(store), schema, config.graph)?;

    match command {
        TableCommand::Merge(args) => cmd_merge(graph, args, format),
        TableCommand::Resolve(args) => cmd_resolve(&graph, args, format),
        TableCommand::Canonical(args) => cmd_canonical(&graph, args, format),
        TableCommand::Check(args) => cmd_check(&graph, args, format),
        TableCommand::Targets(args) => cmd_list(&graph, graph.targets_query(), args, format),
        TableCommand::Sources(args) => cmd_list(&graph, graph.sources_query(), args, format),
    }
}

fn cmd_install(store: &SqliteEntityStore, table: &str, format: OutputFormat) -> anyhow::Result<()> {
    let schema = store
        .describe_table(table)
        .with_context(|| format!("reading table {table}"))?;
    let added = store.install_merge_column(&schema)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "table": table, "added": added })),
        OutputFormat::Text => {
            if added {
                println!("{} Added merge_target_id to {}", "✓".green().bold(), table.bold());
            } else {
                println!("{} {} already has merge_target_id", "✓".green(), table.bold());
            }
            Ok(())
        }
    }
}

fn cmd_merge(graph: RowGraph, args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut target = find(&graph, args.target)?;
    let mut source = find(&graph, args.source)?;
    let names: Vec<String> = args.collections.iter().map(|a| a.name.clone()).collect();

    let engine = MergeEngine::with_associations(graph, args.collections)?;
    let outcome = engine.merge_with_associations(&mut target, &mut source, &names)?;

    match format {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            let table = &engine.graph().schema().table;
            println!(
                "{} Merged {} {} into {}",
                "✓".green().bold(),
                table,
                label(source.id).yellow(),
                label(target.id).yellow().bold()
            );
            for r in &outcome.reassignments {
                println!("  {} {} rows via {}", "moved".cyan(), r.moved, r.association.bold());
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ResolveReport {
    id: EntityId,
    path: Vec<EntityId>,
    canonical: Option<EntityRow>,
}

fn cmd_resolve(graph: &RowGraph, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let row = find(graph, args.id)?;
    let path = graph.trace_chain(&row)?;
    let canonical = graph.resolve_target(&row)?;

    match format {
        OutputFormat::Json => print_json(&ResolveReport {
            id: row.id,
            path,
            canonical,
        }),
        OutputFormat::Text => {
            let mut chain: Vec<String> = path.iter().map(|id| label(*id)).collect();
            match &canonical {
                Some(found) => {
                    if let Some(last) = chain.last_mut() {
                        *last = last.green().bold().to_string();
                    }
                    println!("{}", chain.join(" → "));
                    println!("  {}", render_row(graph.schema(), found));
                }
                None => {
                    chain.push("?".red().bold().to_string());
                    println!("{}", chain.join(" → "));
                    println!("  {}", "dangling merge target".red());
                }
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct CanonicalPair {
    id: EntityId,
    canonical: EntityRow,
}

fn cmd_canonical(graph: &RowGraph, args: CanonicalArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut pairs = Vec::with_capacity(args.ids.len());
    for id in args.ids.into_iter().map(EntityId::new) {
        // Missing ids and dangling pointers drop out of the join.
        if let Some(canonical) = graph.find_canonical(id)? {
            pairs.push(CanonicalPair { id, canonical });
        }
    }

    match format {
        OutputFormat::Json => print_json(&pairs),
        OutputFormat::Text => {
            for pair in &pairs {
                println!(
                    "{} → {}  {}",
                    label(pair.id).yellow(),
                    label(pair.canonical.id).green(),
                    render_row(graph.schema(), &pair.canonical)
                );
            }
            if pairs.is_empty() {
                println!("No matching records.");
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct CheckReport {
    id: EntityId,
    merge_target_id: Option<EntityId>,
    merged: bool,
    mergeable_as_source: bool,
    mergeable_as_target: bool,
    incoming: Vec<EntityId>,
}

fn cmd_check(graph: &RowGraph, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let row = find(graph, args.id)?;
    let report = CheckReport {
        id: row.id,
        merge_target_id: row.merge_target_id,
        merged: graph.is_merged(&row),
        mergeable_as_source: graph.is_mergeable_as_source(&row)?,
        mergeable_as_target: graph.is_mergeable_as_target(&row),
        incoming: graph.sources_of(&row)?.iter().map(|r| r.id).collect(),
    };

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!("{}  {}", label(report.id).yellow().bold(), render_row(graph.schema(), &row));
            match report.merge_target_id {
                Some(target) => println!("  merged into {}", label(target).yellow()),
                None => println!("  {}", "canonical".green()),
            }
            println!("  as source: {}", yes_no(report.mergeable_as_source));
            println!("  as target: {}", yes_no(report.mergeable_as_target));
            if !report.incoming.is_empty() {
                let incoming: Vec<String> = report.incoming.iter().map(|id| label(*id)).collect();
                println!("  merged in: {}", incoming.join(", "));
            }
            Ok(())
        }
    }
}

fn cmd_list(graph: &RowGraph, query: EntityQuery, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let query = match args.limit {
        Some(n) => query.limit(n),
        None => query,
    };
    let rows = graph.fetch_all(&query)?;

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text => {
            for row in &rows {
                let pointer = match row.merge_target_id {
                    Some(target) => format!(" → {}", label(target)).dimmed().to_string(),
                    None => String::new(),
                };
                println!("{}{}  {}", label(row.id).yellow(), pointer, render_row(graph.schema(), row));
            }
            if rows.is_empty() {
                println!("No records.");
            }
            Ok(())
        }
    }
}

fn find(graph: &RowGraph, id: i64) -> anyhow::Result<EntityRow> {
    graph
        .find(EntityId::new(id))?
        .with_context(|| format!("{} #{id} not found", graph.schema().table))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn label(id: EntityId) -> String {
    format!("#{id}")
}

fn yes_no(flag: bool) -> String {
    if flag {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

fn render_row(schema: &TableSchema, row: &EntityRow) -> String {
    schema
        .columns
        .iter()
        .zip(&row.values)
        .map(|(column, value)| format!("{}={}", column.dimmed(), render_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => format!("{s:?}"),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("x'{hex}'")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;
    use chainlink_store::{EntityStore, StoreConfig};

    const MUSIC_DDL: &str = "
        CREATE TABLE artists (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE tracks (id INTEGER PRIMARY KEY, artist_id INTEGER, title TEXT);
        INSERT INTO artists (id, name) VALUES (1, 'Burial'), (2, 'burial'), (3, 'Kode9');
        INSERT INTO tracks (artist_id, title) VALUES (1, 'Archangel'), (2, 'Near Dark'), (2, 'Ghost Hardware');";

    fn run(db: &Path, args: &[&str]) -> anyhow::Result<()> {
        let db = db.to_str().unwrap();
        let mut argv = vec!["chainlink", "--db", db, "--table", "artists"];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv)?)
    }

    fn music_db(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("music.db");
        let store = SqliteEntityStore::open(&path, StoreConfig::default()).unwrap();
        store.with_connection(|c| c.execute_batch(MUSIC_DDL)).unwrap();
        path
    }

    #[test]
    fn install_then_merge_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let db = music_db(dir.path());

        run(&db, &["install"]).unwrap();
        run(&db, &["install"]).unwrap();
        run(&db, &["merge", "1", "2", "--collection", "tracks:artist_id"]).unwrap();

        let store = SqliteEntityStore::open(&db, StoreConfig::default()).unwrap();
        let schema = store.describe_table("artists").unwrap();
        assert_eq!(schema.columns, vec!["name".to_string()]);
        let merged = store
            .read(|tx| tx.fetch(&schema, EntityId::new(2)))
            .unwrap()
            .unwrap();
        assert_eq!(merged.merge_target_id, Some(EntityId::new(1)));
        let tracks: i64 = store
            .with_connection(|c| {
                c.query_row("SELECT COUNT(*) FROM tracks WHERE artist_id = 1", [], |r| r.get(0))
            })
            .unwrap();
        assert_eq!(tracks, 3);

        // 1 now has an incoming merge and cannot become a source.
        assert!(run(&db, &["merge", "3", "1"]).is_err());
    }

    #[test]
    fn read_commands_succeed_in_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let db = music_db(dir.path());
        run(&db, &["install"]).unwrap();
        run(&db, &["merge", "1", "2"]).unwrap();

        for format in ["text", "json"] {
            run(&db, &["--format", format, "resolve", "2"]).unwrap();
            run(&db, &["--format", format, "canonical", "2", "3"]).unwrap();
            run(&db, &["--format", format, "check", "1"]).unwrap();
            run(&db, &["--format", format, "targets"]).unwrap();
            run(&db, &["--format", format, "sources", "-n", "1"]).unwrap();
        }
        assert!(run(&db, &["resolve", "42"]).is_err());
    }

    #[test]
    fn commands_need_an_existing_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("empty.db");
        assert!(run(&db, &["install"]).is_err());
        assert!(run(&db, &["targets"]).is_err());
    }

    #[test]
    fn values_render_compactly() {
        let schema = TableSchema::new("artists", ["name", "rank"]);
        let row = EntityRow::new(EntityId::new(1), vec![Value::from("Burial"), Value::Null]);
        colored::control::set_override(false);
        assert_eq!(render_row(&schema, &row), "name=\"Burial\" rank=null");
    }

    #[test]
    fn binary_values_render_as_hex() {
        assert_eq!(render_value(&Value::Blob(vec![0xff, 0x00, 0x0a])), "x'ff000a'");
    }
}
