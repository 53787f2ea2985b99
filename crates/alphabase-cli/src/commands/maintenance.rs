use alphabase_core::fs::write_atomic;
use alphabase_core::{AlphaBase, Exported};
use serde_json::{json, Value};

use crate::app::AppContext;
use crate::cli::ExportArgs;
use crate::helpers::read_source;
use crate::output::{print_encryption_status, print_json, print_statistics};

pub fn handle_import(ctx: &AppContext, store: &AlphaBase, file: &str) -> anyhow::Result<()> {
    let text = read_source(file)?;
    // Non-JSON text is an encrypted export; the store decides how to read it.
    let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
    store.import_bulk(payload)?;

    let count = store.keys()?.len();
    if ctx.json() {
        print_json(&json!({ "imported": count }))?;
    } else if !ctx.quiet() {
        println!("Imported {} keys into {}", count, store.path().display());
    }
    Ok(())
}

pub fn handle_export(ctx: &AppContext, store: &AlphaBase, args: &ExportArgs) -> anyhow::Result<()> {
    let rendered = match store.export_envelope(args.text)? {
        Exported::Object(value) => serde_json::to_string_pretty(&value)
            .map_err(|e| anyhow::anyhow!("Failed to render export: {}", e))?,
        Exported::Text(text) => text,
    };

    match args.output.as_ref() {
        Some(path) => {
            write_atomic(path, rendered.as_bytes())?;
            if ctx.json() {
                print_json(&json!({ "path": path.display().to_string() }))?;
            } else if !ctx.quiet() {
                println!("Exported to {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

pub fn handle_stats(ctx: &AppContext, store: &AlphaBase) -> anyhow::Result<()> {
    let stats = store.statistics()?;
    if ctx.json() {
        print_json(&stats)
    } else {
        print_statistics(&stats);
        Ok(())
    }
}

pub fn handle_backup(ctx: &AppContext, store: &AlphaBase) -> anyhow::Result<()> {
    let path = store.backup()?;
    if ctx.json() {
        print_json(&json!({ "path": path.display().to_string() }))?;
    } else if ctx.quiet() {
        println!("{}", path.display());
    } else {
        println!("Backed up {} to {}", store.path().display(), path.display());
    }
    Ok(())
}

pub fn handle_status(ctx: &AppContext, store: &AlphaBase) -> anyhow::Result<()> {
    let status = store.encryption_status();
    let keys = store.keys()?.len();
    if ctx.json() {
        return print_json(&json!({
            "path": store.path().display().to_string(),
            "keys": keys,
            "encryption": status,
            "downgraded": status.downgraded(),
        }));
    }
    println!("Store: {}", store.path().display());
    println!("Keys: {}", keys);
    print_encryption_status(&status);
    Ok(())
}
