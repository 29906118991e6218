//! WAV 解析与 PCM16 编码

use crate::application::ports::PreviewError;

/// WAV 头信息
#[derive(Debug, Clone)]
pub struct WavHeader {
    pub num_channels: u16,
    pub sample_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// data chunk 负载起始偏移
    pub data_start: usize,
    /// data chunk 实际可用字节数
    pub data_size: usize,
}

impl WavHeader {
    /// 每帧字节数
    pub fn frame_bytes(&self) -> usize {
        if self.block_align > 0 {
            self.block_align as usize
        } else {
            self.num_channels as usize * (self.bits_per_sample as usize / 8)
        }
    }

    /// 完整帧数
    pub fn total_frames(&self) -> u64 {
        match self.frame_bytes() {
            0 => 0,
            frame => (self.data_size / frame) as u64,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.total_frames() * 1000 / self.sample_rate as u64
    }
}

fn le_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// 解析 WAV 文件头
pub fn parse_wav_header(data: &[u8]) -> Result<WavHeader, PreviewError> {
    if data.len() < 44 {
        return Err(PreviewError::InvalidInput("WAV data too short".to_string()));
    }
    if &data[0..4] != b"RIFF" {
        return Err(PreviewError::InvalidInput(
            "Invalid WAV: missing RIFF header".to_string(),
        ));
    }
    if &data[8..12] != b"WAVE" {
        return Err(PreviewError::InvalidInput(
            "Invalid WAV: missing WAVE identifier".to_string(),
        ));
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16, u16)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = le_u32(data, pos + 4) as usize;
        let body = pos + 8;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || body + 16 > data.len() {
                    return Err(PreviewError::InvalidInput(
                        "Invalid fmt chunk size".to_string(),
                    ));
                }
                fmt = Some((
                    le_u16(data, body + 2),
                    le_u32(data, body + 4),
                    le_u16(data, body + 12),
                    le_u16(data, body + 14),
                ));
            }
            b"data" => {
                let (num_channels, sample_rate, block_align, bits_per_sample) =
                    fmt.ok_or_else(|| {
                        PreviewError::InvalidInput("Invalid WAV: missing fmt chunk".to_string())
                    })?;
                // 流式写出的 WAV 可能带有超长的 data size
                let data_size = chunk_size.min(data.len() - body);
                if data_size == 0 {
                    break;
                }
                return Ok(WavHeader {
                    num_channels,
                    sample_rate,
                    block_align,
                    bits_per_sample,
                    data_start: body,
                    data_size,
                });
            }
            _ => {}
        }

        pos = body.saturating_add(chunk_size);
        // 对齐到偶数字节
        if chunk_size % 2 != 0 {
            pos += 1;
        }
    }

    Err(PreviewError::InvalidInput(
        "Invalid WAV: missing data chunk".to_string(),
    ))
}

/// 截取前 `frames` 帧，保留原始编码，仅改写 RIFF/data 大小
pub fn truncate_wav(data: &[u8], header: &WavHeader, frames: u64) -> Vec<u8> {
    let keep = (frames as usize * header.frame_bytes()).min(header.data_size);
    let pad = keep % 2;

    let mut out = Vec::with_capacity(header.data_start + keep + pad);
    out.extend_from_slice(&data[..header.data_start]);
    out.extend_from_slice(&data[header.data_start..header.data_start + keep]);
    if pad == 1 {
        out.push(0);
    }

    let riff_size = (out.len() - 8) as u32;
    out[4..8].copy_from_slice(&riff_size.to_le_bytes());
    let size_at = header.data_start - 4;
    out[size_at..header.data_start].copy_from_slice(&(keep as u32).to_le_bytes());
    out
}

/// 将交错的 f32 样本编码为 PCM WAV，`bits_per_sample` 为 8 或 16
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let bits_per_sample: u16 = if bits_per_sample <= 8 { 8 } else { 16 };
    let sample_bytes = (bits_per_sample / 8) as usize;
    let byte_rate = sample_rate * channels as u32 * sample_bytes as u32;
    let block_align = channels * sample_bytes as u16;

    let data_size = samples.len() * sample_bytes;
    let pad = data_size % 2;
    let file_size = 36 + data_size + pad;

    let mut wav = Vec::with_capacity(44 + data_size + pad);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(file_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());

    for &s in samples {
        let s = s.clamp(-1.0, 1.0);
        if bits_per_sample == 8 {
            // 8-bit PCM 为无符号
            wav.push(((s * 127.0) as i16 + 128) as u8);
        } else {
            wav.extend_from_slice(&((s * 32767.0) as i16).to_le_bytes());
        }
    }
    if pad == 1 {
        wav.push(0);
    }

    wav
}

/// 生成确定性的锯齿波 WAV，用于测试与 fake 提取器
pub fn sawtooth_wav(duration_ms: u64, sample_rate: u32, channels: u16, seed: u64) -> Vec<u8> {
    let frames = duration_ms * sample_rate as u64 / 1000;
    let period = 50 + (seed % 200);
    let mut samples = Vec::with_capacity(frames as usize * channels as usize);
    for i in 0..frames {
        let phase = ((i + seed) % period) as f32 / period as f32;
        let value = phase * 1.6 - 0.8;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    encode_wav(&samples, sample_rate, channels, 16)
}
