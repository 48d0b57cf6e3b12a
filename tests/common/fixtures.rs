//! Stub codec scripts and image fixtures
//!
//! Every script is invoked as `<script> <mode> <input> <output>`.

use std::path::PathBuf;
use tempfile::TempDir;

/// Copies the input to the output
pub const COPY_CODEC: &str = r#"cp "$2" "$3""#;

/// Compresses by keeping the first quarter of the input, decompresses by copying
pub const QUARTER_CODEC: &str = r#"if [ "$1" = "compress" ]; then
  size=$(wc -c < "$2")
  head -c $((size / 4)) "$2" > "$3"
else
  cp "$2" "$3"
fi"#;

/// Writes a partial output, complains, and exits non-zero
pub const FAILING_CODEC: &str = r#"echo "Loading image..."
echo "partial" > "$3"
echo "Failed to load image" >&2
exit 3"#;

/// Exits 0 without writing anything
pub const SILENT_CODEC: &str = "exit 0";

/// Succeeds but writes a warning to stderr
pub const NOISY_CODEC: &str = r#"cp "$2" "$3"
echo "warning: unusual palette" >&2"#;

/// Never finishes on its own
pub const HANGING_CODEC: &str = r#"echo "partial" > "$3"
exec sleep 30"#;

/// Forks a worker that writes the output late, then waits for it
pub const FORKING_CODEC: &str = r#"( sleep 1; echo late > "$3" ) &
wait"#;

/// Write `body` as an executable shell script in `dir`
pub fn write_codec_script(dir: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("codec.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
    path
}

/// A 2x2 24-bit bitmap (70 bytes)
pub fn tiny_bitmap() -> Vec<u8> {
    let mut bmp = Vec::with_capacity(70);
    // file header
    bmp.extend_from_slice(b"BM");
    bmp.extend_from_slice(&70u32.to_le_bytes());
    bmp.extend_from_slice(&[0, 0, 0, 0]);
    bmp.extend_from_slice(&54u32.to_le_bytes());
    // info header
    bmp.extend_from_slice(&40u32.to_le_bytes());
    bmp.extend_from_slice(&2i32.to_le_bytes());
    bmp.extend_from_slice(&2i32.to_le_bytes());
    bmp.extend_from_slice(&1u16.to_le_bytes());
    bmp.extend_from_slice(&24u16.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    bmp.extend_from_slice(&16u32.to_le_bytes());
    bmp.extend_from_slice(&2835i32.to_le_bytes());
    bmp.extend_from_slice(&2835i32.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    bmp.extend_from_slice(&0u32.to_le_bytes());
    // two rows of two BGR pixels, each padded to 4 bytes
    bmp.extend_from_slice(&[0, 0, 255, 255, 255, 255, 0, 0]);
    bmp.extend_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0]);
    bmp
}
