//! Binary storage for embedding artifacts.
//!
//! Vector file format: `<variant>.vec`
//!
//! Header (15 bytes):
//! - version: u8 (1)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated):
//! - word_len: u16 (little-endian)
//! - word: [u8; word_len] (utf-8)
//! - vector: [f32; dimensions] (little-endian)
//!
//! Frequency file format: `word_frequencies.bin`
//!
//! Header (13 bytes):
//! - version: u8 (1)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated):
//! - word_len: u16 (little-endian)
//! - word: [u8; word_len] (utf-8)
//! - count: u64 (little-endian)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Vector header size in bytes: version(1) + dimensions(2) + entry_count(8) + checksum(4)
const VECTOR_HEADER_SIZE: usize = 15;

/// Frequency header size in bytes: version(1) + entry_count(8) + checksum(4)
const FREQUENCY_HEADER_SIZE: usize = 13;

/// Errors that can occur while reading or writing artifact files.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,
}

impl ArtifactError {
    /// Whether the underlying cause is a missing file rather than bad contents.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtifactError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Reader/writer for a single vector artifact file.
pub struct VectorArtifact {
    path: PathBuf,
}

impl VectorArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all (word, vector) entries from the artifact.
    ///
    /// Returns the dimensionality and the entries in file order.
    pub fn load(&self) -> Result<(usize, Vec<(String, Vec<f32>)>), ArtifactError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = read_vector_header(&mut reader)?;
        let dimensions = header.dimensions as usize;
        if dimensions == 0 {
            return Err(ArtifactError::InvalidFormat(
                "dimensions must be greater than 0".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let word = read_word(&mut reader)?;

            let mut vector = Vec::with_capacity(dimensions);
            for _ in 0..dimensions {
                let mut float_bytes = [0u8; 4];
                reader.read_exact(&mut float_bytes)?;
                vector.push(f32::from_le_bytes(float_bytes));
            }

            entries.push((word, vector));
        }

        Ok((dimensions, entries))
    }

    /// Save (word, vector) entries to the artifact.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(
        &self,
        dimensions: usize,
        entries: &[(String, Vec<f32>)],
    ) -> Result<(), ArtifactError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, dimensions, entries);

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        dimensions: usize,
        entries: &[(String, Vec<f32>)],
    ) -> Result<(), ArtifactError> {
        for (word, vector) in entries {
            if vector.len() != dimensions {
                return Err(ArtifactError::InvalidFormat(format!(
                    "vector for '{}' has {} dimensions, expected {}",
                    word,
                    vector.len(),
                    dimensions
                )));
            }
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut header_bytes = [0u8; VECTOR_HEADER_SIZE];
        header_bytes[0] = FORMAT_VERSION;
        header_bytes[1..3].copy_from_slice(&(dimensions as u16).to_le_bytes());
        header_bytes[3..11].copy_from_slice(&(entries.len() as u64).to_le_bytes());
        let checksum = crc32fast::hash(&header_bytes[0..11]);
        header_bytes[11..15].copy_from_slice(&checksum.to_le_bytes());
        writer.write_all(&header_bytes)?;

        for (word, vector) in entries {
            write_word(&mut writer, word)?;
            for &value in vector {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        flush_and_sync(writer)?;

        Ok(())
    }
}

/// Reader/writer for the shared word frequency artifact.
pub struct FrequencyArtifact {
    path: PathBuf,
}

impl FrequencyArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<HashMap<String, u64>, ArtifactError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let mut header_bytes = [0u8; FREQUENCY_HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;

        let version = header_bytes[0];
        if version > FORMAT_VERSION {
            return Err(ArtifactError::VersionMismatch(version, FORMAT_VERSION));
        }

        let entry_count = u64::from_le_bytes(header_bytes[1..9].try_into().unwrap());
        let stored_checksum = u32::from_le_bytes(header_bytes[9..13].try_into().unwrap());

        let computed_checksum = crc32fast::hash(&header_bytes[0..9]);
        if stored_checksum != computed_checksum {
            return Err(ArtifactError::ChecksumMismatch);
        }

        let mut frequencies = HashMap::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let word = read_word(&mut reader)?;

            let mut count_bytes = [0u8; 8];
            reader.read_exact(&mut count_bytes)?;
            frequencies.insert(word, u64::from_le_bytes(count_bytes));
        }

        Ok(frequencies)
    }

    pub fn save(&self, frequencies: &HashMap<String, u64>) -> Result<(), ArtifactError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, frequencies);

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        frequencies: &HashMap<String, u64>,
    ) -> Result<(), ArtifactError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut header_bytes = [0u8; FREQUENCY_HEADER_SIZE];
        header_bytes[0] = FORMAT_VERSION;
        header_bytes[1..9].copy_from_slice(&(frequencies.len() as u64).to_le_bytes());
        let checksum = crc32fast::hash(&header_bytes[0..9]);
        header_bytes[9..13].copy_from_slice(&checksum.to_le_bytes());
        writer.write_all(&header_bytes)?;

        // Fixed order so identical tables produce identical files
        let mut entries: Vec<_> = frequencies.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (word, &count) in entries {
            write_word(&mut writer, word)?;
            writer.write_all(&count.to_le_bytes())?;
        }

        flush_and_sync(writer)?;

        Ok(())
    }
}

struct VectorHeader {
    dimensions: u16,
    entry_count: u64,
}

fn read_vector_header(reader: &mut BufReader<File>) -> Result<VectorHeader, ArtifactError> {
    let mut header_bytes = [0u8; VECTOR_HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;

    let version = header_bytes[0];
    if version > FORMAT_VERSION {
        return Err(ArtifactError::VersionMismatch(version, FORMAT_VERSION));
    }

    let dimensions = u16::from_le_bytes(header_bytes[1..3].try_into().unwrap());
    let entry_count = u64::from_le_bytes(header_bytes[3..11].try_into().unwrap());
    let stored_checksum = u32::from_le_bytes(header_bytes[11..15].try_into().unwrap());

    // Verify checksum (computed over header without checksum field)
    let computed_checksum = crc32fast::hash(&header_bytes[0..11]);
    if stored_checksum != computed_checksum {
        return Err(ArtifactError::ChecksumMismatch);
    }

    Ok(VectorHeader {
        dimensions,
        entry_count,
    })
}

fn read_word(reader: &mut BufReader<File>) -> Result<String, ArtifactError> {
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes)?;
    let len = u16::from_le_bytes(len_bytes) as usize;

    let mut word_bytes = vec![0u8; len];
    reader.read_exact(&mut word_bytes)?;

    String::from_utf8(word_bytes)
        .map_err(|_| ArtifactError::InvalidFormat("word is not valid utf-8".to_string()))
}

fn write_word(writer: &mut BufWriter<File>, word: &str) -> Result<(), ArtifactError> {
    let bytes = word.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(ArtifactError::InvalidFormat(format!(
            "word too long: {} bytes",
            bytes.len()
        )));
    }

    writer.write_all(&(bytes.len() as u16).to_le_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn flush_and_sync(mut writer: BufWriter<File>) -> Result<(), ArtifactError> {
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_path(ext: &str) -> PathBuf {
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "wordscope-artifact-test-{}-{}.{}",
            std::process::id(),
            counter,
            ext
        ))
    }

    fn sample_entries() -> Vec<(String, Vec<f32>)> {
        vec![
            ("cat".to_string(), vec![1.0, 0.0, 0.5]),
            ("dog".to_string(), vec![0.9, 0.1, 0.4]),
            ("car".to_string(), vec![0.0, 1.0, -0.3]),
        ]
    }

    #[test]
    fn test_save_and_load_vectors() {
        let path = temp_path("vec");
        let artifact = VectorArtifact::new(path.clone());

        artifact.save(3, &sample_entries()).unwrap();
        assert!(artifact.exists());

        let (dimensions, entries) = artifact.load().unwrap();
        assert_eq!(dimensions, 3);
        assert_eq!(entries, sample_entries());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_and_load_empty() {
        let path = temp_path("vec");
        let artifact = VectorArtifact::new(path.clone());

        artifact.save(200, &[]).unwrap();

        let (dimensions, entries) = artifact.load().unwrap();
        assert_eq!(dimensions, 200);
        assert!(entries.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let artifact = VectorArtifact::new(temp_path("vec"));

        let err = artifact.load().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_dimension_mismatch_rejected_on_save() {
        let path = temp_path("vec");
        let artifact = VectorArtifact::new(path.clone());

        let entries = vec![("cat".to_string(), vec![1.0, 0.0])];
        let result = artifact.save(3, &entries);
        assert!(matches!(result, Err(ArtifactError::InvalidFormat(_))));

        // Failed save must not leave a temp file behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let path = temp_path("vec");
        let artifact = VectorArtifact::new(path.clone());
        artifact.save(3, &sample_entries()).unwrap();

        // Corrupt a header byte
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(4)).unwrap();
        file.write_all(&[0xFF]).unwrap();

        let result = artifact.load();
        assert!(matches!(result, Err(ArtifactError::ChecksumMismatch)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_version_mismatch() {
        let path = temp_path("vec");
        let artifact = VectorArtifact::new(path.clone());
        artifact.save(3, &sample_entries()).unwrap();

        // Bump the version byte (and leave the checksum stale; version is
        // checked before the checksum so the error must name the version)
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0)).unwrap();
        file.write_all(&[99]).unwrap();

        let result = artifact.load();
        assert!(matches!(result, Err(ArtifactError::VersionMismatch(99, 1))));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_truncated_file_is_invalid() {
        let path = temp_path("vec");
        let artifact = VectorArtifact::new(path.clone());
        artifact.save(3, &sample_entries()).unwrap();

        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 5]).unwrap();

        let result = artifact.load();
        assert!(matches!(result, Err(ArtifactError::Io(_))));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_frequency_round_trip() {
        let path = temp_path("bin");
        let artifact = FrequencyArtifact::new(path.clone());

        let mut frequencies = HashMap::new();
        frequencies.insert("cat".to_string(), 10u64);
        frequencies.insert("dog".to_string(), 5u64);
        frequencies.insert("car".to_string(), 1u64);

        artifact.save(&frequencies).unwrap();
        let loaded = artifact.load().unwrap();
        assert_eq!(loaded, frequencies);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_frequency_checksum_detects_corruption() {
        let path = temp_path("bin");
        let artifact = FrequencyArtifact::new(path.clone());

        let mut frequencies = HashMap::new();
        frequencies.insert("cat".to_string(), 10u64);
        artifact.save(&frequencies).unwrap();

        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(2)).unwrap();
        file.write_all(&[0xFF]).unwrap();

        let result = artifact.load();
        assert!(matches!(result, Err(ArtifactError::ChecksumMismatch)));

        let _ = std::fs::remove_file(&path);
    }
}
