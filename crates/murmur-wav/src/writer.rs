use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("encoder already finalized")]
    Finalized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// PCM container parameters. 16-bit little-endian integer samples only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
        }
    }
}

const HEADER_LEN: u32 = 44;

/// Incremental WAV writer.
///
/// The 44-byte header is written on creation with zero-length size fields, so
/// a session that captures nothing still leaves a structurally valid, playable
/// empty file on disk. `finalize` patches the two size fields in place;
/// `abort` closes the stream without patching. Neither allows further writes.
pub struct StreamingWavWriter {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    spec: WavSpec,
    data_bytes: u32,
    finalized: bool,
}

impl StreamingWavWriter {
    pub fn create(path: impl AsRef<Path>, spec: WavSpec) -> Result<Self, EncoderError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, spec, 0)?;
        writer.flush()?;
        Ok(Self {
            writer: Some(writer),
            path,
            spec,
            data_bytes: 0,
            finalized: false,
        })
    }

    /// Append one frame of normalized samples. Each sample is clamped to
    /// [-1, 1], scaled by 32767 and truncated toward zero. Appending an empty
    /// frame is a no-op; appending after `finalize`/`abort` is an error.
    pub fn append(&mut self, samples: &[f32]) -> Result<(), EncoderError> {
        let writer = self.writer.as_mut().ok_or(EncoderError::Finalized)?;
        if samples.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        writer.write_all(&bytes)?;
        self.data_bytes += bytes.len() as u32;
        Ok(())
    }

    /// Bytes of sample data written so far. Valid at any time.
    pub fn data_size(&self) -> u32 {
        self.data_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Patch the RIFF and data size fields and close the stream. Calling it
    /// a second time is a no-op; calling it after `abort` is an error.
    pub fn finalize(&mut self) -> Result<(), EncoderError> {
        let Some(mut writer) = self.writer.take() else {
            return if self.finalized {
                Ok(())
            } else {
                Err(EncoderError::Finalized)
            };
        };
        writer.flush()?;
        let mut file = writer.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&(self.data_bytes + HEADER_LEN - 8).to_le_bytes())?;
        file.seek(SeekFrom::Start(40))?;
        file.write_all(&self.data_bytes.to_le_bytes())?;
        file.sync_all()?;
        self.finalized = true;
        Ok(())
    }

    /// Close the stream without patching the header. The file on disk keeps
    /// its zero-length size fields and further writes fail.
    pub fn abort(&mut self) {
        self.writer = None;
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

fn write_header<W: Write>(w: &mut W, spec: WavSpec, data_size: u32) -> std::io::Result<()> {
    let byte_rate = spec.sample_rate * spec.channels as u32 * spec.bits_per_sample as u32 / 8;
    let block_align = spec.channels * spec.bits_per_sample / 8;

    w.write_all(b"RIFF")?;
    w.write_all(&(data_size + HEADER_LEN - 8).to_le_bytes())?;
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&spec.channels.to_le_bytes())?;
    w.write_all(&spec.sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&spec.bits_per_sample.to_le_bytes())?;
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    Ok(())
}
