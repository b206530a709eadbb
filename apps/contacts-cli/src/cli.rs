use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use datastore::EntityId;

use crate::config::StorageProvider;

#[derive(Parser)]
#[command(name = "contacts", about = "Manage contacts in a local data store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage backend; overrides STORAGE_PROVIDER
    #[arg(long, global = true, value_enum)]
    pub storage: Option<StorageProvider>,

    /// SQLite database file; overrides DB_PATH
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a contact and print its identity
    Add(EntryArgs),
    /// Show one contact
    Get(IdArgs),
    /// List every contact
    List,
    /// List contacts with a home phone, by last name
    CallList,
    /// Replace a contact's details
    Edit(EditArgs),
    /// Delete a contact and its related records
    Delete(IdArgs),
}

#[derive(Args)]
pub struct EntryArgs {
    /// Contact as JSON, or `-` to read it from stdin
    #[arg(value_name = "JSON")]
    pub entry: String,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: EntityId,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: EntityId,
    #[command(flatten)]
    pub entry: EntryArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "contacts",
            "edit",
            "3",
            r#"{"email":"a@b.com"}"#,
            "--storage",
            "memory",
        ])
        .unwrap();
        assert_eq!(cli.storage, Some(StorageProvider::Memory));
        assert!(cli.db_path.is_none());
        match cli.command {
            Command::Edit(args) => {
                assert_eq!(args.id, 3);
                assert_eq!(args.entry.entry, r#"{"email":"a@b.com"}"#);
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn rejects_non_numeric_identity() {
        assert!(Cli::try_parse_from(["contacts", "get", "abc"]).is_err());
    }
}
