//! Capture sink that spawns the system `ffmpeg`.
//!
//! Video frames stream over stdin into a temporary video file while the audio
//! tap spools to a raw `f32le` file alongside it; `end` muxes the two into
//! the final artifact with the video stream copied, so the session stays one
//! continuous encode regardless of how many tracks it spans.

use crate::capture::sink::{CaptureArtifact, CaptureConfig, CaptureSink, Encoding};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{StudioError, StudioResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::frame::FrameRGBA;
use std::collections::HashSet;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, info};

/// Options for [`FfmpegCaptureSink`] output.
#[derive(Clone, Debug)]
pub struct FfmpegCaptureSinkOpts {
    /// Output file path; the extension is adjusted to the selected container.
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl FfmpegCaptureSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Combined A/V sink backed by the system `ffmpeg`.
pub struct FfmpegCaptureSink {
    opts: FfmpegCaptureSinkOpts,
    encoders: HashSet<String>,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<CaptureConfig>,
    last_idx: Option<FrameIndex>,
    frames: u64,
    audio_samples: u64,

    final_path: Option<PathBuf>,
    audio_spool: Option<std::io::BufWriter<std::fs::File>>,
    temps: TempFileGuard,
}

impl FfmpegCaptureSink {
    /// Create a sink; encoder availability is probed once, up front.
    pub fn new(opts: FfmpegCaptureSinkOpts) -> Self {
        let encoders = probe_encoders();
        debug!(count = encoders.len(), "probed ffmpeg encoders");
        Self {
            opts,
            encoders,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
            frames: 0,
            audio_samples: 0,
            final_path: None,
            audio_spool: None,
            temps: TempFileGuard::default(),
        }
    }

    fn temp_path(&self, suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "spectrum_studio_capture_{}_{}.{suffix}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ))
    }
}

impl CaptureSink for FfmpegCaptureSink {
    fn supports(&self, encoding: Encoding) -> bool {
        self.encoders.contains(encoding.video_encoder())
            && self.encoders.contains(encoding.audio_encoder())
    }

    fn begin(&mut self, cfg: CaptureConfig) -> StudioResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(StudioError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(StudioError::validation(
                "capture width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(StudioError::validation(
                "capture width/height must be even (required for yuv420p output)",
            ));
        }
        if cfg.audio_sample_rate == 0 || cfg.audio_channels == 0 {
            return Err(StudioError::validation(
                "audio sample_rate/channels must be non-zero",
            ));
        }
        if !self.supports(cfg.encoding) {
            return Err(StudioError::unsupported(format!(
                "ffmpeg is missing encoders for {:?}",
                cfg.encoding
            )));
        }

        let final_path = self
            .opts
            .out_path
            .with_extension(cfg.encoding.container_extension());
        ensure_parent_dir(&final_path)?;
        if !self.opts.overwrite && final_path.exists() {
            return Err(StudioError::validation(format!(
                "output file '{}' already exists",
                final_path.display()
            )));
        }

        let temp_video = self.temp_path(cfg.encoding.container_extension());
        let temp_audio = self.temp_path("f32le");

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args(["-y", "-loglevel", "error"]);

        // Input: raw RGBA frames at the capture rate; alpha is flattened
        // before writing to stdin (push_frame).
        cmd.args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            cfg.encoding.video_encoder(),
            "-b:v",
            &cfg.video_bitrate.to_string(),
            "-pix_fmt",
            "yuv420p",
        ]);
        if cfg.encoding.container_extension() == "mp4" {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.arg(&temp_video);

        let mut child = cmd.spawn().map_err(|e| {
            StudioError::capture(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StudioError::capture("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StudioError::capture("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let spool_file = std::fs::File::create(&temp_audio).map_err(|e| {
            StudioError::capture(format!(
                "failed to create audio spool '{}': {e}",
                temp_audio.display()
            ))
        })?;

        self.temps.clear();
        self.temps.0.push(temp_video);
        self.temps.0.push(temp_audio);
        self.scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.audio_spool = Some(std::io::BufWriter::new(spool_file));
        self.final_path = Some(final_path);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.frames = 0;
        self.audio_samples = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> StudioResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| StudioError::capture("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(StudioError::capture(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(StudioError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(StudioError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_frame(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StudioError::capture("ffmpeg sink is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            StudioError::capture(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> StudioResult<()> {
        if self.cfg.is_none() {
            return Err(StudioError::capture("ffmpeg sink not started"));
        }
        let Some(spool) = self.audio_spool.as_mut() else {
            return Err(StudioError::capture("ffmpeg sink is already finalized"));
        };
        for &s in samples {
            spool.write_all(&s.to_le_bytes()).map_err(|e| {
                StudioError::capture(format!("failed to write audio spool: {e}"))
            })?;
        }
        self.audio_samples += samples.len() as u64;
        Ok(())
    }

    fn end(&mut self) -> StudioResult<CaptureArtifact> {
        let cfg = self
            .cfg
            .take()
            .ok_or_else(|| StudioError::capture("ffmpeg sink not started"))?;

        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StudioError::capture("ffmpeg sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| StudioError::capture(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StudioError::capture("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| StudioError::capture(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(StudioError::capture(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        if let Some(spool) = self.audio_spool.take() {
            spool
                .into_inner()
                .map_err(|e| StudioError::capture(format!("failed to flush audio spool: {e}")))?
                .sync_all()
                .map_err(|e| StudioError::capture(format!("failed to sync audio spool: {e}")))?;
        }

        let final_path = self
            .final_path
            .take()
            .ok_or_else(|| StudioError::capture("ffmpeg sink output path missing"))?;
        let temp_video = self.temps.0[0].clone();
        let temp_audio = self.temps.0[1].clone();

        if self.audio_samples > 0 {
            let mut cmd = Command::new("ffmpeg");
            cmd.args(["-y", "-loglevel", "error", "-i"])
                .arg(&temp_video)
                .args([
                    "-f",
                    "f32le",
                    "-ar",
                    &cfg.audio_sample_rate.to_string(),
                    "-ac",
                    &cfg.audio_channels.to_string(),
                    "-i",
                ])
                .arg(&temp_audio)
                .args([
                    "-c:v",
                    "copy",
                    "-c:a",
                    cfg.encoding.audio_encoder(),
                    "-b:a",
                    "192k",
                    "-shortest",
                ]);
            if cfg.encoding.container_extension() == "mp4" {
                cmd.args(["-movflags", "+faststart"]);
            }
            cmd.arg(&final_path);

            let out = cmd
                .output()
                .map_err(|e| StudioError::capture(format!("failed to run ffmpeg mux: {e}")))?;
            if !out.status.success() {
                let stderr = String::from_utf8_lossy(&out.stderr);
                return Err(StudioError::capture(format!(
                    "ffmpeg mux exited with status {}: {}",
                    out.status,
                    stderr.trim()
                )));
            }
        } else {
            std::fs::copy(&temp_video, &final_path).map_err(|e| {
                StudioError::capture(format!(
                    "failed to place output '{}': {e}",
                    final_path.display()
                ))
            })?;
        }

        self.temps.clear();
        info!(
            path = %final_path.display(),
            frames = self.frames,
            audio_samples = self.audio_samples,
            "capture artifact finalized"
        );
        Ok(CaptureArtifact {
            path: Some(final_path),
            frames: self.frames,
            audio_samples: self.audio_samples,
        })
    }
}

#[derive(Debug, Default)]
struct TempFileGuard(Vec<PathBuf>);

impl TempFileGuard {
    fn clear(&mut self) {
        for path in self.0.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        self.clear();
    }
}

fn probe_encoders() -> HashSet<String> {
    let Ok(out) = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
    else {
        return HashSet::new();
    };
    if !out.status.success() {
        return HashSet::new();
    }
    parse_encoder_list(&String::from_utf8_lossy(&out.stdout))
}

fn parse_encoder_list(text: &str) -> HashSet<String> {
    // Lines look like " V....D libx264    H.264 / AVC ...": capability flags
    // then the encoder name.
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            (flags.len() == 6 && (flags.starts_with('V') || flags.starts_with('A')))
                .then(|| name.to_owned())
        })
        .collect()
}

/// Composite a premultiplied frame over an opaque backing color, producing
/// the opaque RGBA bytes rawvideo input expects.
fn flatten_frame(dst: &mut [u8], src_premul: &[u8], backing: [u8; 4]) -> StudioResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(StudioError::validation(
            "frame flatten requires equal-length rgba8 buffers",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3];
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = u16::from(255 - a);
        for c in 0..3 {
            let over = u16::from(s[c]) + mul_div255_u16(u16::from(backing[c]), inv);
            d[c] = over.min(255) as u8;
        }
        d[3] = 255;
    }

    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub(crate) fn ensure_parent_dir(path: &Path) -> StudioResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_resolves_transparent_and_opaque_pixels() {
        // Transparent pixel shows the backing color; opaque passes through;
        // half-covered white blends toward the backing.
        let src = [0u8, 0, 0, 0, 9, 8, 7, 255, 128, 128, 128, 128];
        let mut dst = [0u8; 12];
        flatten_frame(&mut dst, &src, [40, 80, 120, 255]).unwrap();
        assert_eq!(&dst[0..4], &[40, 80, 120, 255]);
        assert_eq!(&dst[4..8], &[9, 8, 7, 255]);
        assert_eq!(dst[3], 255);
        assert!(dst[8] > 128 && dst[11] == 255, "blend stays opaque");
    }

    #[test]
    fn flatten_rejects_mismatched_buffers() {
        let mut dst = [0u8; 8];
        assert!(flatten_frame(&mut dst, &[0u8; 4], [0, 0, 0, 255]).is_err());
    }

    #[test]
    fn encoder_list_parse_picks_video_and_audio_rows() {
        let text = "\
Encoders:
 V..... = Video
 ------
 V....D libx264              H.264 / AVC / MPEG-4 AVC
 V....D libvpx               libvpx VP8
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libopus              libopus Opus
 S..... dvbsub               DVB subtitles
";
        let set = parse_encoder_list(text);
        assert!(set.contains("libx264"));
        assert!(set.contains("aac"));
        assert!(set.contains("libopus"));
        assert!(!set.contains("dvbsub"));
        assert!(!set.contains("Encoders:"));
    }

    #[test]
    fn support_requires_both_codecs() {
        let mut sink = FfmpegCaptureSink::new(FfmpegCaptureSinkOpts::new("/tmp/out.mp4"));
        sink.encoders = ["libx264".to_owned()].into_iter().collect();
        assert!(!sink.supports(Encoding::Mp4H264Aac), "aac missing");

        sink.encoders.insert("aac".to_owned());
        assert!(sink.supports(Encoding::Mp4H264Aac));
        assert!(!sink.supports(Encoding::WebmVp9Opus));
    }
}
