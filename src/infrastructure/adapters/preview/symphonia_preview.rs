//! Symphonia Preview Synthesizer
//!
//! - 短于上限的输入: 原样返回（同格式、同字节）
//! - WAV: 按整帧截取 data chunk，保留原编码
//! - MP3: 按整帧复制前 N 帧，保留原编码
//! - 其他格式: symphonia 解码前 N 帧，输出 PCM WAV（源采样率与声道数，位深不高于源）

use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::wav::{encode_wav, parse_wav_header, truncate_wav};
use crate::application::ports::{PreviewArtifact, PreviewError, PreviewSynthesizerPort};
use crate::domain::track::AudioFormat;

/// 预览生成器
#[derive(Debug, Default, Clone)]
pub struct SymphoniaPreviewSynthesizer;

struct DecodedClip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: Option<u32>,
    source_frames: Option<u64>,
}

/// 按包扫描的结果，不解码
struct PacketScan {
    sample_rate: u32,
    /// 已扫描的帧数；`reached_end` 时即完整时长
    scanned_frames: u64,
    reached_end: bool,
    source_frames: Option<u64>,
    /// MP3 在上限内的整帧
    kept: Vec<u8>,
    kept_frames: u64,
}

fn frames_for(max_duration: Duration, sample_rate: u32) -> u64 {
    (max_duration.as_millis() as u64).saturating_mul(sample_rate as u64) / 1000
}

fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        0
    } else {
        frames * 1000 / sample_rate as u64
    }
}

fn open_reader(audio: &[u8], format: AudioFormat) -> Result<Box<dyn FormatReader>, PreviewError> {
    let cursor = Cursor::new(audio.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PreviewError::DecodingError(format!("Probe failed: {}", e)))?;
    Ok(probed.format)
}

impl SymphoniaPreviewSynthesizer {
    pub fn new() -> Self {
        Self
    }

    fn preview_wav(&self, audio: &[u8], max_duration: Duration) -> Result<PreviewArtifact, PreviewError> {
        let header = parse_wav_header(audio)?;
        if header.sample_rate == 0 || header.frame_bytes() == 0 {
            return Err(PreviewError::InvalidInput("WAV without sample layout".to_string()));
        }

        let total_frames = header.total_frames();
        let max_frames = frames_for(max_duration, header.sample_rate);
        let source_duration_ms = header.duration_ms();

        if total_frames <= max_frames {
            return Ok(PreviewArtifact {
                audio_data: audio.to_vec(),
                format: AudioFormat::Wav,
                duration_ms: source_duration_ms,
                source_duration_ms: Some(source_duration_ms),
            });
        }

        Ok(PreviewArtifact {
            audio_data: truncate_wav(audio, &header, max_frames),
            format: AudioFormat::Wav,
            duration_ms: frames_to_ms(max_frames, header.sample_rate),
            source_duration_ms: Some(source_duration_ms),
        })
    }

    /// 读包直到超过 `max_duration` 或流结束
    ///
    /// 时长取自包时间戳，MP3 同时收集上限内的整帧
    fn scan_packets(
        &self,
        audio: &[u8],
        format: AudioFormat,
        max_duration: Duration,
    ) -> Result<PacketScan, PreviewError> {
        let mut reader = open_reader(audio, format)?;

        let track = reader
            .default_track()
            .ok_or_else(|| PreviewError::DecodingError("No audio track found".to_string()))?;
        let track_id = track.id;
        let keep_packets = track.codec_params.codec == CODEC_TYPE_MP3;
        let source_frames = track.codec_params.n_frames;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PreviewError::DecodingError("Unknown sample rate".to_string()))?;

        let max_frames = frames_for(max_duration, sample_rate);
        let mut scan = PacketScan {
            sample_rate,
            scanned_frames: 0,
            reached_end: false,
            source_frames,
            kept: Vec::new(),
            kept_frames: 0,
        };

        loop {
            let packet = match reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    scan.reached_end = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    scan.reached_end = true;
                    break;
                }
                Err(e) => {
                    return Err(PreviewError::DecodingError(format!("Packet read error: {}", e)));
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            scan.scanned_frames += packet.dur;
            if scan.scanned_frames > max_frames {
                break;
            }
            if keep_packets {
                scan.kept.extend_from_slice(packet.buf());
                scan.kept_frames = scan.scanned_frames;
            }
        }

        if scan.reached_end && scan.scanned_frames == 0 {
            return Err(PreviewError::DecodingError("No audio packets".to_string()));
        }
        Ok(scan)
    }

    /// 解码直到 `max_duration`，不解码剩余部分
    fn decode_clip(
        &self,
        audio: &[u8],
        format: AudioFormat,
        max_duration: Duration,
    ) -> Result<DecodedClip, PreviewError> {
        let mut reader = open_reader(audio, format)?;

        let track = reader
            .default_track()
            .ok_or_else(|| PreviewError::DecodingError("No audio track found".to_string()))?;
        let track_id = track.id;
        let source_frames = track.codec_params.n_frames;
        let bits_per_sample = track.codec_params.bits_per_sample;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PreviewError::DecodingError("Unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PreviewError::DecodingError(format!("Decoder creation failed: {}", e)))?;

        let max_frames = frames_for(max_duration, sample_rate);
        let mut channels: u16 = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);
        let mut samples: Vec<f32> = Vec::new();
        let mut decoded_frames = 0u64;
        let mut reached_end = false;

        while decoded_frames < max_frames {
            let packet = match reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    reached_end = true;
                    break;
                }
                Err(e) => {
                    return Err(PreviewError::DecodingError(format!("Packet read error: {}", e)));
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(error = %e, "Decode error (skipping packet)");
                    continue;
                }
                Err(e) => return Err(PreviewError::DecodingError(e.to_string())),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }
            channels = spec.channels.count() as u16;

            let mut buf = SampleBuffer::<f32>::new(frames as u64, spec);
            buf.copy_interleaved_ref(decoded);
            let take = (frames as u64).min(max_frames - decoded_frames) as usize;
            samples.extend_from_slice(&buf.samples()[..take * channels as usize]);
            decoded_frames += take as u64;
        }

        if samples.is_empty() || channels == 0 {
            return Err(PreviewError::DecodingError("No audio decoded".to_string()));
        }

        // 容器未给出总帧数时，只有完整解码才能确定时长
        let source_frames = source_frames.or(if reached_end {
            Some(decoded_frames)
        } else {
            None
        });

        Ok(DecodedClip {
            samples,
            sample_rate,
            channels,
            bits_per_sample,
            source_frames,
        })
    }
}

impl PreviewSynthesizerPort for SymphoniaPreviewSynthesizer {
    fn make_preview(
        &self,
        audio: &[u8],
        format: AudioFormat,
        max_duration: Duration,
    ) -> Result<PreviewArtifact, PreviewError> {
        if audio.is_empty() {
            return Err(PreviewError::InvalidInput("empty audio".to_string()));
        }
        if !self.supports_format(format) {
            return Err(PreviewError::UnsupportedFormat(format.to_string()));
        }

        if format == AudioFormat::Wav {
            return self.preview_wav(audio, max_duration);
        }

        let scan = self.scan_packets(audio, format, max_duration)?;
        if scan.reached_end {
            let duration_ms = frames_to_ms(scan.scanned_frames, scan.sample_rate);
            return Ok(PreviewArtifact {
                audio_data: audio.to_vec(),
                format,
                duration_ms,
                source_duration_ms: Some(duration_ms),
            });
        }

        // 未读到结尾时，已扫描帧数是完整时长的下界
        let source_frames = scan.source_frames.unwrap_or(0).max(scan.scanned_frames);

        if !scan.kept.is_empty() {
            tracing::debug!(
                format = %format,
                sample_rate = scan.sample_rate,
                frames = scan.kept_frames,
                "Cut preview on frame boundary"
            );
            return Ok(PreviewArtifact {
                audio_data: scan.kept,
                format,
                duration_ms: frames_to_ms(scan.kept_frames, scan.sample_rate),
                source_duration_ms: Some(frames_to_ms(source_frames, scan.sample_rate)),
            });
        }

        let clip = self.decode_clip(audio, format, max_duration)?;
        let frames = (clip.samples.len() / clip.channels as usize) as u64;
        let bits = clip.bits_per_sample.map(|b| b.min(16) as u16).unwrap_or(16);

        tracing::debug!(
            format = %format,
            sample_rate = clip.sample_rate,
            channels = clip.channels,
            bits = bits,
            frames = frames,
            "Decoded preview clip"
        );

        Ok(PreviewArtifact {
            audio_data: encode_wav(&clip.samples, clip.sample_rate, clip.channels, bits),
            format: AudioFormat::Wav,
            duration_ms: frames_to_ms(frames, clip.sample_rate),
            source_duration_ms: Some(frames_to_ms(
                clip.source_frames.unwrap_or(0).max(source_frames),
                clip.sample_rate,
            )),
        })
    }

    fn supports_format(&self, format: AudioFormat) -> bool {
        matches!(
            format,
            AudioFormat::Wav | AudioFormat::Mp3 | AudioFormat::M4a | AudioFormat::Ogg | AudioFormat::Flac
        )
    }
}
