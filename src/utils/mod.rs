use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Alphabet for push ids, in ascending ASCII order so keys sort by time.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Current Unix time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Generate a chronologically sortable key for a new database child.
///
/// 8 characters encode the timestamp, 12 random characters follow.
pub fn push_id() -> String {
    push_id_at(now_millis())
}

pub fn push_id_at(millis: u64) -> String {
    let mut id = [0u8; 20];
    let mut time = millis;
    for slot in id[..8].iter_mut().rev() {
        *slot = PUSH_CHARS[(time % 64) as usize];
        time /= 64;
    }

    let mut rng = rand::thread_rng();
    for slot in id[8..].iter_mut() {
        *slot = PUSH_CHARS[rng.gen_range(0..64)];
    }

    // Every byte comes from the ASCII alphabet above.
    id.iter().map(|b| *b as char).collect()
}

/// Format a file size the way the chat shows it ("512 bytes", "1.5 KB", ...)
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Get the filename from a path
pub fn get_filename(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|os_str| os_str.to_str())
        .map(String::from)
}

/// Pick a path inside `dir` for `name` that does not exist yet.
///
/// `photo.png` becomes `photo (1).png`, `photo (2).png`, ...
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let extension = as_path.extension().and_then(|e| e.to_str());

    let mut counter = 1u32;
    loop {
        let next = match extension {
            Some(ext) => format!("{} ({}).{}", stem, counter, ext),
            None => format!("{} ({})", stem, counter),
        };
        let candidate = dir.join(next);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Create directory if it doesn't exist
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}
