use alphabase_core::AlphaBase;
use serde_json::{json, Value};
use tracing::debug;

use crate::app::AppContext;
use crate::cli::BatchArgs;
use crate::errors::CliError;
use crate::helpers::{parse_json, read_source};
use crate::output::print_json;

pub fn handle_batch(ctx: &AppContext, store: &AlphaBase, args: &BatchArgs) -> anyhow::Result<()> {
    let text = read_source(&args.file)?;
    let ops = match parse_json(&text, "batch")? {
        Value::Array(ops) => ops,
        _ => {
            return Err(CliError::InvalidArgument(
                "Batch input must be a JSON array of operations".to_string(),
            )
            .into())
        }
    };

    debug!(ops = ops.len(), atomic = args.atomic, "applying batch");
    let applied = if args.atomic {
        store.transactionally_json(&ops)?
    } else {
        store.apply_batch_json(&ops)?
    };

    if ctx.json() {
        print_json(&json!({ "applied": applied, "atomic": args.atomic }))?;
    } else if !ctx.quiet() {
        println!("Applied {} operations", applied);
    }
    Ok(())
}
