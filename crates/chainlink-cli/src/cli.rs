use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use chainlink_merge::Association;

#[derive(Parser)]
#[command(
    name = "chainlink",
    about = "Chainlink: fold duplicate records into canonical merge chains",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file
    #[arg(long, global = true, default_value = "chainlink.db")]
    pub db: PathBuf,

    /// Mergeable table
    #[arg(short, long, global = true, default_value = "records")]
    pub table: String,

    /// TOML file with [store] and [graph] settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add the merge_target_id column and index to an existing table
    Install,
    #[command(flatten)]
    Table(TableCommand),
}

/// Commands that need the table's merge column in place.
#[derive(Subcommand)]
pub enum TableCommand {
    /// Merge SOURCE into TARGET
    Merge(MergeArgs),
    /// Follow a record's merge chain to its canonical record
    Resolve(IdArgs),
    /// Look up the immediate merge target of each id in one query
    Canonical(CanonicalArgs),
    /// Show whether a record is merged and how it may take part in a merge
    Check(IdArgs),
    /// List canonical records
    Targets(ListArgs),
    /// List merged-away records
    Sources(ListArgs),
}

#[derive(Args)]
pub struct MergeArgs {
    pub target: i64,
    pub source: i64,
    /// Child rows to move to the target first, as TABLE:FOREIGN_KEY
    #[arg(long = "collection", value_name = "TABLE:FK", value_parser = parse_collection)]
    pub collections: Vec<Association>,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: i64,
}

#[derive(Args)]
pub struct CanonicalArgs {
    #[arg(required = true)]
    pub ids: Vec<i64>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Parse `TABLE:FK` into a collection association named after the argument.
pub fn parse_collection(raw: &str) -> Result<Association, String> {
    let (table, foreign_key) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected TABLE:FOREIGN_KEY, got {raw:?}"))?;
    let association = Association::collection(raw, table, foreign_key);
    association.validate().map_err(|e| e.to_string())?;
    Ok(association)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlink_merge::AssociationKind;

    #[test]
    fn collection_argument() {
        let a = parse_collection("tracks:artist_id").unwrap();
        assert_eq!(a.name, "tracks:artist_id");
        assert_eq!(a.table, "tracks");
        assert_eq!(a.foreign_key, "artist_id");
        assert_eq!(a.kind, AssociationKind::Collection);

        assert!(parse_collection("tracks").is_err());
        assert!(parse_collection("tracks:artist id").is_err());
    }

    #[test]
    fn merge_command_line() {
        let cli = Cli::try_parse_from([
            "chainlink", "--db", "music.db", "-t", "artists", "merge", "1", "2",
            "--collection", "tracks:artist_id", "--collection", "albums:artist_id",
        ])
        .unwrap();
        assert_eq!(cli.table, "artists");
        assert_eq!(cli.format, OutputFormat::Text);
        match cli.command {
            Command::Table(TableCommand::Merge(args)) => {
                assert_eq!((args.target, args.source), (1, 2));
                assert_eq!(args.collections.len(), 2);
                assert_eq!(args.collections[1].table, "albums");
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn canonical_needs_ids() {
        assert!(Cli::try_parse_from(["chainlink", "canonical"]).is_err());
        assert!(Cli::try_parse_from(["chainlink", "--format", "json", "canonical", "3", "4"]).is_ok());
    }

    #[test]
    fn install_and_table_commands_share_one_level() {
        let cli = Cli::try_parse_from(["chainlink", "install"]).unwrap();
        assert!(matches!(cli.command, Command::Install));
        let cli = Cli::try_parse_from(["chainlink", "targets", "-n", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Table(TableCommand::Targets(ListArgs { limit: Some(2) }))
        ));
    }
}
