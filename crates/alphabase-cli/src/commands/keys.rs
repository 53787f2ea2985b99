use alphabase_core::AlphaBase;
use serde_json::{json, Value};

use crate::app::AppContext;
use crate::cli::SetArgs;
use crate::errors::CliError;
use crate::helpers::{display_value, parse_value};
use crate::output::{print_json, ttl_summary};

pub fn handle_set(ctx: &AppContext, store: &AlphaBase, args: &SetArgs) -> anyhow::Result<()> {
    let value = parse_value(&args.value, args.raw);
    store.set(&args.key, value, args.ttl)?;
    if ctx.json() {
        print_json(&json!({ "key": args.key, "ttlMs": args.ttl.unwrap_or(0) }))?;
    } else if !ctx.quiet() {
        match args.ttl.filter(|ms| *ms > 0) {
            Some(ms) => println!("Set {} (expires in {})", args.key, ttl_summary(ms)),
            None => println!("Set {}", args.key),
        }
    }
    Ok(())
}

pub fn handle_get(ctx: &AppContext, store: &AlphaBase, key: &str) -> anyhow::Result<()> {
    let value = store
        .get(key)?
        .ok_or_else(|| CliError::KeyNotFound(key.to_string()))?;
    if ctx.json() {
        print_json(&value)?;
    } else {
        println!("{}", display_value(&value));
    }
    Ok(())
}

pub fn handle_delete(ctx: &AppContext, store: &AlphaBase, key: &str) -> anyhow::Result<()> {
    let deleted = store.delete(key)?;
    if ctx.json() {
        print_json(&json!({ "key": key, "deleted": deleted }))?;
    } else if !ctx.quiet() {
        if deleted {
            println!("Deleted {}", key);
        } else {
            println!("Key not present: {}", key);
        }
    }
    Ok(())
}

pub fn handle_has(ctx: &AppContext, store: &AlphaBase, key: &str) -> anyhow::Result<()> {
    let present = store.has(key)?;
    if ctx.json() {
        print_json(&json!({ "key": key, "present": present }))?;
    } else {
        println!("{}", present);
    }
    Ok(())
}

pub fn handle_list(ctx: &AppContext, store: &AlphaBase, values: bool) -> anyhow::Result<()> {
    if values {
        let documents = store.all()?;
        if ctx.json() {
            return print_json(&Value::Object(documents));
        }
        for (key, value) in &documents {
            println!("{} = {}", key, display_value(value));
        }
        return Ok(());
    }

    let keys = store.keys()?;
    if ctx.json() {
        return print_json(&keys);
    }
    for key in &keys {
        println!("{}", key);
    }
    if keys.is_empty() && !ctx.quiet() {
        eprintln!("Store is empty");
    }
    Ok(())
}

pub fn handle_ttl(ctx: &AppContext, store: &AlphaBase, key: &str) -> anyhow::Result<()> {
    if !store.has(key)? {
        return Err(CliError::KeyNotFound(key.to_string()).into());
    }
    let remaining = store.get_ttl(key)?;
    if ctx.json() {
        print_json(&json!({ "key": key, "ttlMs": remaining }))?;
    } else if ctx.quiet() {
        println!("{}", remaining);
    } else {
        println!("{}", ttl_summary(remaining));
    }
    Ok(())
}

pub fn handle_clear(ctx: &AppContext, store: &AlphaBase, yes: bool) -> anyhow::Result<()> {
    if !yes && ctx.interactive() && !ctx.quiet() {
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!("Remove every key from {}?", store.path().display()))
            .default(false)
            .interact()?;
        if !proceed {
            return Err(anyhow::anyhow!("Clear cancelled"));
        }
    }
    store.clear()?;
    if ctx.json() {
        print_json(&json!({ "cleared": true }))?;
    } else if !ctx.quiet() {
        println!("Cleared {}", store.path().display());
    }
    Ok(())
}
