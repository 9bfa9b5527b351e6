//! Splits a large data file into independently parseable parts.
//!
//! Each part is a contiguous byte range of the source; the source's first
//! line is re-prepended to every part after the first so a line-oriented
//! consumer sees a header in each one. The duplication is intentional: the
//! emitted bytes total `source + (parts - 1) * header` and the receiving side
//! processes each part as an append on top of the previous one.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How far into the file the header is searched for.
const HEADER_PROBE_BYTES: u64 = 10 * 1024;

pub const MIN_PARTS: usize = 2;
pub const MAX_PARTS: usize = 20;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("part count must be between {MIN_PARTS} and {MAX_PARTS}, got {0}")]
    InvalidPartCount(usize),
    #[error("cannot split an empty file")]
    EmptyFile,
}

/// One emitted part.
#[derive(Debug, Clone)]
pub struct SplitPart {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Part count chosen from the file size when the caller does not pick one.
pub fn default_part_count(file_size: u64) -> usize {
    if file_size > 100 * MIB {
        20
    } else if file_size > 50 * MIB {
        15
    } else if file_size > 10 * MIB {
        10
    } else {
        5
    }
}

/// Reads the header from the probe window: everything up to and including
/// the first newline. A probe window without a newline yields the whole
/// window as the header (see DESIGN.md; kept for compatibility).
fn read_header(source: &mut File) -> io::Result<Vec<u8>> {
    let mut probe = Vec::with_capacity(HEADER_PROBE_BYTES as usize);
    Read::by_ref(source)
        .take(HEADER_PROBE_BYTES)
        .read_to_end(&mut probe)?;

    match probe.iter().position(|&b| b == b'\n') {
        Some(end) => {
            probe.truncate(end + 1);
            Ok(probe)
        }
        None => Ok(probe),
    }
}

fn part_name(source: &Path, index: usize) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "part".to_string());
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{stem}_part{}{ext}", index + 1)
}

/// Splits `source` into `parts` files under `out_dir` (created if missing).
///
/// Part sizes are `ceil(total / parts)` of source bytes; the first part is
/// the raw leading range, every later part is the header followed by its
/// range. Ranges past the end of a small file come out header-only.
pub fn split_file(
    source: &Path,
    parts: Option<usize>,
    out_dir: &Path,
) -> Result<Vec<SplitPart>, SplitError> {
    let total = std::fs::metadata(source)?.len();
    if total == 0 {
        return Err(SplitError::EmptyFile);
    }

    let parts = match parts {
        Some(n) if !(MIN_PARTS..=MAX_PARTS).contains(&n) => {
            return Err(SplitError::InvalidPartCount(n))
        }
        Some(n) => n,
        None => default_part_count(total),
    };

    let mut file = File::open(source)?;
    let header = read_header(&mut file)?;
    std::fs::create_dir_all(out_dir)?;

    let part_size = total.div_ceil(parts as u64);
    let mut emitted = Vec::with_capacity(parts);

    for index in 0..parts {
        let start = index as u64 * part_size;
        let end = total.min(start + part_size);
        let range_len = end.saturating_sub(start);

        let name = part_name(source, index);
        let path = out_dir.join(&name);
        let mut writer = io::BufWriter::new(File::create(&path)?);

        let mut written = 0u64;
        if index > 0 {
            writer.write_all(&header)?;
            written += header.len() as u64;
        }
        if range_len > 0 {
            file.seek(SeekFrom::Start(start))?;
            written += io::copy(&mut Read::by_ref(&mut file).take(range_len), &mut writer)?;
        }
        writer.flush()?;

        emitted.push(SplitPart {
            path,
            name,
            size: written,
        });
    }

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn first_line(path: &Path) -> Vec<u8> {
        let file = File::open(path).unwrap();
        let mut reader = io::BufReader::new(file);
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).unwrap();
        line
    }

    #[test]
    fn sizes_sum_to_source_plus_duplicated_headers() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = b"COL_A|COL_B\n".to_vec();
        for i in 0..500 {
            content.extend_from_slice(format!("row{i}|value{i}\n").as_bytes());
        }
        let source = write_source(dir.path(), "data.txt", &content);

        let parts = split_file(&source, Some(4), &dir.path().join("out")).unwrap();
        assert_eq!(parts.len(), 4);

        let header_len = b"COL_A|COL_B\n".len() as u64;
        let total: u64 = parts.iter().map(|p| p.size).sum();
        assert_eq!(total, content.len() as u64 + 3 * header_len);

        for part in &parts {
            assert_eq!(std::fs::metadata(&part.path).unwrap().len(), part.size);
            assert_eq!(first_line(&part.path), b"COL_A|COL_B\n");
        }
    }

    #[test]
    fn part_names_follow_the_source_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "export_2025.txt", b"h\nbody\n");
        let parts = split_file(&source, Some(2), &dir.path().join("out")).unwrap();
        assert_eq!(parts[0].name, "export_2025_part1.txt");
        assert_eq!(parts[1].name, "export_2025_part2.txt");
    }

    #[test]
    fn ranges_past_the_end_emit_header_only_parts() {
        let dir = tempfile::tempdir().unwrap();
        // 9 source bytes into 6 parts of ceil(9/6)=2 leave the last range
        // empty, so the last part is header-only.
        let source = write_source(dir.path(), "tiny.txt", b"ab\ncdefgh");
        let parts = split_file(&source, Some(6), &dir.path().join("out")).unwrap();
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[5].size, 3); // header only
        let total: u64 = parts.iter().map(|p| p.size).sum();
        assert_eq!(total, 9 + 5 * 3);
    }

    #[test]
    fn probe_without_newline_takes_the_whole_prefix_as_header() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![b'x'; 64];
        let source = write_source(dir.path(), "oneline.txt", &content);

        let parts = split_file(&source, Some(2), &dir.path().join("out")).unwrap();
        // Header is the full 64-byte prefix; part 2 = header + its 32-byte range.
        assert_eq!(parts[0].size, 32);
        assert_eq!(parts[1].size, 64 + 32);
    }

    #[test]
    fn rejects_out_of_range_part_counts_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "data.txt", b"h\nbody\n");
        assert!(matches!(
            split_file(&source, Some(1), dir.path()),
            Err(SplitError::InvalidPartCount(1))
        ));
        assert!(matches!(
            split_file(&source, Some(21), dir.path()),
            Err(SplitError::InvalidPartCount(21))
        ));

        let empty = write_source(dir.path(), "empty.txt", b"");
        assert!(matches!(
            split_file(&empty, Some(2), dir.path()),
            Err(SplitError::EmptyFile)
        ));
    }

    #[test]
    fn default_counts_scale_with_size() {
        assert_eq!(default_part_count(MIB), 5);
        assert_eq!(default_part_count(20 * MIB), 10);
        assert_eq!(default_part_count(60 * MIB), 15);
        assert_eq!(default_part_count(200 * MIB), 20);
    }
}
