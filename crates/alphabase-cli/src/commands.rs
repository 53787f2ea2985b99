//! Command handlers. Each receives an open store and the app context.

mod batch;
mod documents;
mod keys;
mod maintenance;

use alphabase_core::AlphaBase;

use crate::app::AppContext;
use crate::cli::Commands;

pub fn dispatch(ctx: &AppContext, store: &AlphaBase, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Set(args) => keys::handle_set(ctx, store, args),
        Commands::Get { key } => keys::handle_get(ctx, store, key),
        Commands::Delete { key } => keys::handle_delete(ctx, store, key),
        Commands::Has { key } => keys::handle_has(ctx, store, key),
        Commands::List { values } => keys::handle_list(ctx, store, *values),
        Commands::Ttl { key } => keys::handle_ttl(ctx, store, key),
        Commands::Clear { yes } => keys::handle_clear(ctx, store, *yes),
        Commands::Import { file } => maintenance::handle_import(ctx, store, file),
        Commands::Export(args) => maintenance::handle_export(ctx, store, args),
        Commands::Stats => maintenance::handle_stats(ctx, store),
        Commands::Backup => maintenance::handle_backup(ctx, store),
        Commands::Status => maintenance::handle_status(ctx, store),
        Commands::Batch(args) => batch::handle_batch(ctx, store, args),
        Commands::Doc(command) => documents::handle_doc(ctx, store, command),
    }
}
