use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique, not-yet-created path under the system temp dir.
///
/// Nanosecond timestamp plus a process-wide counter, so parallel tests in
/// one binary never collide.
pub fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "conclave-{name}-{}-{nanos}-{seq}",
        std::process::id()
    ))
}

/// Like [`temp_path`], but the directory exists on return.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = temp_path(name);
    let _ = std::fs::create_dir_all(&dir);
    dir
}
