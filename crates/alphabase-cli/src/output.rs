//! Output formatting helpers for the CLI.

use alphabase_core::{EncryptionStatus, StoreStatistics};
use serde::Serialize;

use crate::helpers::{format_bytes, format_millis};

/// Print any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("Failed to render JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}

pub fn print_statistics(stats: &StoreStatistics) {
    println!("Keys: {}", stats.total_keys);
    println!("File size: {}", format_bytes(stats.file_size_bytes));
    match stats.last_modified {
        Some(at) => println!("Last modified: {}", at.to_rfc3339()),
        None => println!("Last modified: unknown"),
    }
    println!(
        "Approximate memory: {}",
        format_bytes(stats.approximate_memory_usage as u64)
    );
    println!(
        "Average value size: {}",
        format_bytes(stats.average_value_size_bytes as u64)
    );
    match stats.largest_key_name.as_deref() {
        Some(name) => println!(
            "Largest value: {} ({})",
            name,
            format_bytes(stats.largest_value_size_bytes as u64)
        ),
        None => println!("Largest value: none"),
    }
}

pub fn print_encryption_status(status: &EncryptionStatus) {
    println!("Cipher: {}", status.configured);
    if status.downgraded() {
        println!(
            "Warning: no passphrase set; saving as {} instead of {}",
            status.effective, status.configured
        );
    } else if status.encrypted_at_rest() {
        println!("Encrypted at rest: yes");
    } else {
        println!("Encrypted at rest: no");
    }
}

/// Human rendering of a remaining TTL.
pub fn ttl_summary(ms: u64) -> String {
    if ms == 0 {
        "no expiry".to_string()
    } else {
        format!("{} ({})", ms, format_millis(ms))
    }
}
