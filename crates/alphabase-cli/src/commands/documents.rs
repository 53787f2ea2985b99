use alphabase_core::{AlphaBase, AlphaError};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::DocCommands;
use crate::helpers::parse_json;
use crate::output::print_json;

pub fn handle_doc(ctx: &AppContext, store: &AlphaBase, command: &DocCommands) -> anyhow::Result<()> {
    match command {
        DocCommands::Insert {
            collection,
            document,
            ttl,
        } => {
            let document = parse_json(document, "document")?;
            let id = store.insert_document(collection, document, *ttl)?;
            if ctx.json() {
                print_json(&json!({ "collection": collection, "id": id }))?;
            } else {
                println!("{}", id);
            }
        }
        DocCommands::Get { collection, id } => {
            let document = store
                .get_document(collection, id)?
                .ok_or_else(|| AlphaError::DocumentNotFound {
                    collection: collection.clone(),
                    id: id.clone(),
                })?;
            print_json(&document)?;
        }
        DocCommands::Update {
            collection,
            id,
            patch,
        } => {
            let patch = parse_json(patch, "patch")?;
            let updated = store.update_document(collection, id, patch)?;
            if ctx.json() {
                print_json(&updated)?;
            } else if !ctx.quiet() {
                println!("Updated {}/{}", collection, id);
            }
        }
        DocCommands::Delete { collection, id } => {
            store.delete_document(collection, id)?;
            if ctx.json() {
                print_json(&json!({ "collection": collection, "id": id, "deleted": true }))?;
            } else if !ctx.quiet() {
                println!("Deleted {}/{}", collection, id);
            }
        }
        DocCommands::List { collection } => {
            let documents = store.list_documents(collection)?;
            if ctx.json() {
                print_json(&documents)?;
            } else {
                for document in &documents {
                    println!("{}", document);
                }
            }
        }
    }
    Ok(())
}
