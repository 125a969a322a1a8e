use lewton::inside_ogg::OggStreamReader;
use log::{debug, info};
use std::fmt;
use std::io::{self, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub enum AudioSourceError {
    Missing(PathBuf),
    Unreadable(PathBuf, io::Error),
    Empty(PathBuf),
    Unsupported(PathBuf),
    Undecodable(PathBuf, String),
}

impl fmt::Display for AudioSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(p) => write!(f, "audio file not found: {}", p.display()),
            Self::Unreadable(p, e) => write!(f, "failed to read audio file {}: {e}", p.display()),
            Self::Empty(p) => write!(f, "audio file is empty: {}", p.display()),
            Self::Unsupported(p) => write!(
                f,
                "unsupported audio format: {} (expected .ogg, .mp3 or .flac)",
                p.display()
            ),
            Self::Undecodable(p, e) => write!(f, "cannot decode {}: {e}", p.display()),
        }
    }
}

impl std::error::Error for AudioSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unreadable(_, e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Ogg,
    Mp3,
    Flac,
}

impl AudioFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ogg" | "oga" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
        })
    }
}

/// Stream parameters read from the file headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
}

/// An uploaded track whose headers decoded cleanly.
#[derive(Debug, Clone)]
pub struct AudioSource {
    name: String,
    info: AudioInfo,
}

impl AudioSource {
    pub fn open(path: &Path) -> Result<Self, AudioSourceError> {
        if !path.exists() {
            return Err(AudioSourceError::Missing(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| AudioSourceError::Unreadable(path.to_path_buf(), e))?;
        if bytes.is_empty() {
            return Err(AudioSourceError::Empty(path.to_path_buf()));
        }
        let format = AudioFormat::from_path(path)
            .ok_or_else(|| AudioSourceError::Unsupported(path.to_path_buf()))?;
        let info = read_info(format, &bytes)
            .map_err(|e| AudioSourceError::Undecodable(path.to_path_buf(), e))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        info!(
            "Loaded audio '{}' ({}, {} Hz, {} ch, {:.1}s).",
            name,
            info.format,
            info.sample_rate,
            info.channels,
            info.duration.as_secs_f32()
        );
        Ok(Self { name, info })
    }

    #[cfg(test)]
    pub fn with_info(name: impl Into<String>, info: AudioInfo) -> Self {
        Self {
            name: name.into(),
            info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn info(&self) -> &AudioInfo {
        &self.info
    }

    pub const fn duration(&self) -> Duration {
        self.info.duration
    }
}

fn read_info(format: AudioFormat, bytes: &[u8]) -> Result<AudioInfo, String> {
    let (sample_rate, channels, frames) = match format {
        AudioFormat::Ogg => ogg_info(bytes)?,
        AudioFormat::Mp3 => mp3_info(bytes)?,
        AudioFormat::Flac => flac_info(bytes)?,
    };
    if sample_rate == 0 {
        return Err("invalid sample rate (0)".into());
    }
    if channels == 0 {
        return Err("no audio channels".into());
    }
    if frames == 0 {
        return Err("stream has no audio frames".into());
    }
    let duration = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate));
    debug!("{format}: {frames} frames at {sample_rate} Hz.");
    Ok(AudioInfo {
        format,
        sample_rate,
        channels,
        duration,
    })
}

/// lewton reads the identification header; the length comes from the last
/// page's granule position.
fn ogg_info(bytes: &[u8]) -> Result<(u32, u16, u64), String> {
    let reader = OggStreamReader::new(BufReader::new(Cursor::new(bytes)))
        .map_err(|e| format!("lewton header error: {e}"))?;
    let rate = reader.ident_hdr.audio_sample_rate;
    let channels = u16::from(reader.ident_hdr.audio_channels);
    Ok((rate, channels, last_granule(bytes)?))
}

fn last_granule(data: &[u8]) -> Result<u64, String> {
    const PAGE_HEADER: usize = 27;

    let mut i = data.len().saturating_sub(PAGE_HEADER);
    while i > 0 {
        if &data[i..i + 4] == b"OggS" {
            let granule = u64::from_le_bytes(
                data[i + 6..i + 14]
                    .try_into()
                    .map_err(|_| "failed to read granule position".to_string())?,
            );
            if granule != u64::MAX {
                return Ok(granule);
            }
        }
        i -= 1;
    }
    Err("no valid granule position found".into())
}

/// MP3 has no reliable length header, so every frame is decoded once.
fn mp3_info(bytes: &[u8]) -> Result<(u32, u16, u64), String> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut rate = 0;
    let mut channels = 0;
    let mut frames: u64 = 0;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 0 {
                    continue;
                }
                rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                channels = u16::try_from(frame.channels).unwrap_or(0);
                frames += (frame.data.len() / frame.channels) as u64;
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(format!("minimp3 error: {e:?}")),
        }
    }
    if frames == 0 {
        return Err("no mp3 frames found".into());
    }
    Ok((rate, channels, frames))
}

fn flac_info(bytes: &[u8]) -> Result<(u32, u16, u64), String> {
    let reader = claxon::FlacReader::new(Cursor::new(bytes))
        .map_err(|e| format!("claxon header error: {e}"))?;
    let info = reader.streaminfo();
    let frames = info
        .samples
        .ok_or_else(|| "stream length missing from STREAMINFO".to_string())?;
    let channels = u16::try_from(info.channels).map_err(|_| "too many channels".to_string())?;
    Ok((info.sample_rate, channels, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("drumsync-{}-{name}", std::process::id()))
    }

    /// Metadata-only FLAC stream: 2 s of 16-bit stereo at 44.1 kHz.
    fn flac_header() -> Vec<u8> {
        let mut bytes = b"fLaC".to_vec();
        // Last metadata block, type STREAMINFO, 34 bytes.
        bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36) | 88_200;
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);
        bytes
    }

    #[test]
    fn missing_file_is_reported() {
        let path = temp_path("does-not-exist.ogg");
        assert!(matches!(
            AudioSource::open(&path),
            Err(AudioSourceError::Missing(_))
        ));
    }

    #[test]
    fn empty_file_is_rejected() {
        let path = temp_path("empty.ogg");
        std::fs::write(&path, b"").unwrap();
        let res = AudioSource::open(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(AudioSourceError::Empty(_))));
    }

    #[test]
    fn flac_headers_give_stream_info() {
        let path = temp_path("track.flac");
        std::fs::write(&path, flac_header()).unwrap();
        let src = AudioSource::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(src.name().ends_with("track.flac"));
        let info = src.info();
        assert_eq!(info.format, AudioFormat::Flac);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(src.duration(), Duration::from_secs(2));
    }

    #[test]
    fn garbage_ogg_is_undecodable() {
        let path = temp_path("noise.ogg");
        std::fs::write(&path, [1u8, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let res = AudioSource::open(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(AudioSourceError::Undecodable(..))));
    }

    #[test]
    fn garbage_mp3_is_undecodable() {
        let path = temp_path("noise.mp3");
        std::fs::write(&path, [0u8; 64]).unwrap();
        let res = AudioSource::open(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(AudioSourceError::Undecodable(..))));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let path = temp_path("notes.txt");
        std::fs::write(&path, b"not audio").unwrap();
        let res = AudioSource::open(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(AudioSourceError::Unsupported(_))));
    }

    #[test]
    fn granule_comes_from_last_page() {
        let mut data = vec![0u8; 8];
        for granule in [1_000u64, 48_000] {
            data.extend_from_slice(b"OggS");
            data.extend_from_slice(&[0, 0]);
            data.extend_from_slice(&granule.to_le_bytes());
            data.extend_from_slice(&[0; 13]);
        }
        data.extend_from_slice(&[0; 40]);
        assert_eq!(last_granule(&data), Ok(48_000));
    }
}
