//! Persisted chunk corpus.
//!
//! The corpus is the interchange artifact between chunker output and index
//! input: a line-delimited file, one chunk per line. Re-reading an identical
//! file yields identical chunks, so rebuilds are stable.

use crate::chunking::Chunk;
use crate::error::{AvisaError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Write chunks to a corpus file, replacing any existing content.
pub fn write_corpus(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for chunk in chunks {
        serde_json::to_writer(&mut writer, chunk)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!("Wrote {} chunks to {:?}", chunks.len(), path);
    Ok(())
}

/// Append chunks to a corpus file, creating it if needed.
///
/// Used during fetch so progress survives a partial run.
pub fn append_corpus(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    for chunk in chunks {
        serde_json::to_writer(&mut writer, chunk)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    debug!("Appended {} chunks to {:?}", chunks.len(), path);
    Ok(())
}

/// Read all chunks from a corpus file.
///
/// A malformed line fails the whole read: a corrupt corpus would corrupt
/// every downstream ranking, so there is no salvage mode.
pub fn read_corpus(path: &Path) -> Result<Vec<Chunk>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AvisaError::InvalidInput(format!(
                "Chunk corpus not found at {:?}. Run 'avisa fetch' first.",
                path
            ))
        } else {
            e.into()
        }
    })?;

    let reader = BufReader::new(file);
    let mut chunks = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line).map_err(|e| {
            AvisaError::MalformedInput(format!(
                "corpus line {} is not a valid chunk record: {}",
                lineno + 1,
                e
            ))
        })?;
        chunks.push(chunk);
    }

    debug!("Read {} chunks from {:?}", chunks.len(), path);
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            Chunk {
                video_id: "vid00000001".to_string(),
                channel: "Markets Daily".to_string(),
                title: "Morning Brief".to_string(),
                start_offset: 0.0,
                text: "opening remarks on rates".to_string(),
            },
            Chunk {
                video_id: "vid00000001".to_string(),
                channel: "Markets Daily".to_string(),
                title: "Morning Brief".to_string(),
                start_offset: 60.0,
                text: "earnings preview".to_string(),
            },
        ]
    }

    #[test]
    fn test_write_then_read_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");

        let chunks = sample_chunks();
        write_corpus(&path, &chunks).unwrap();

        let read_back = read_corpus(&path).unwrap();
        assert_eq!(read_back, chunks);

        // Re-reading the identical file yields identical chunks again.
        let again = read_corpus(&path).unwrap();
        assert_eq!(again, read_back);
    }

    #[test]
    fn test_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");

        let chunks = sample_chunks();
        append_corpus(&path, &chunks[..1]).unwrap();
        append_corpus(&path, &chunks[1..]).unwrap();

        let read_back = read_corpus(&path).unwrap();
        assert_eq!(read_back.len(), 2);
    }

    #[test]
    fn test_malformed_line_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");
        std::fs::write(&path, "{\"video_id\": \"x\"\nnot json\n").unwrap();

        let err = read_corpus(&path).unwrap_err();
        assert!(matches!(err, AvisaError::MalformedInput(_)));
    }

    #[test]
    fn test_missing_file_reports_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_corpus(&dir.path().join("nope.jsonl")).unwrap_err();
        assert!(matches!(err, AvisaError::InvalidInput(_)));
    }
}
