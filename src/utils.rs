//! Utility functions for job tokens and file names

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process sequence appended to the timestamp so two jobs created in the
/// same millisecond still get different tokens
static TOKEN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a token that is unique within this process and unlikely to clash
/// with files left by another process
///
/// Format: `<unix millis>-<sequence>-<4 random hex bytes>`
///
/// # Examples
///
/// ```
/// use ppconv::utils::unique_token;
///
/// let a = unique_token();
/// let b = unique_token();
/// assert_ne!(a, b);
/// ```
pub fn unique_token() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = TOKEN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rand::thread_rng().r#gen();
    format!("{}-{}-{:08x}", millis, seq, salt)
}

/// Name of the artifact a job produces: `processed_<token>.<ext>`
pub fn output_filename(token: &str, extension: &str) -> String {
    format!("processed_{}.{}", token, extension)
}

/// Name a staged upload gets in the inbound directory
pub fn staged_filename(token: &str) -> String {
    format!("upload_{}", token)
}

/// Check that a client-supplied name is a bare file name
///
/// Rejects anything that could walk out of a directory when joined to it.
///
/// # Examples
///
/// ```
/// use ppconv::utils::is_plain_filename;
///
/// assert!(is_plain_filename("processed_1.pp"));
/// assert!(!is_plain_filename("../etc/passwd"));
/// assert!(!is_plain_filename("a/b.pp"));
/// ```
#[must_use]
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// `Content-Disposition` header value offering `filename` as a download
pub fn attachment_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", ascii)
}
