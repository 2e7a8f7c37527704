//! Host environment snapshot embedded in every record's `env` field.
//!
//! The machine id hashes the primary interface MAC so records from the same
//! box correlate across runs without shipping the raw address.

use sha2::{Digest, Sha256};

/// Stable, anonymized per-machine identifier (16 hex chars).
pub fn machine_id() -> String {
    let mac = default_net::get_default_interface()
        .ok()
        .and_then(|iface| iface.mac_addr)
        .map(|mac| mac.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut hasher = Sha256::new();
    hasher.update(mac.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

/// Environment blob for the record envelope.
pub fn collect() -> serde_json::Value {
    serde_json::json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpu_count": std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        "machine_id": machine_id(),
        "harness_version": env!("CARGO_PKG_VERSION"),
    })
}
