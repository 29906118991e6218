//! MPEG-1 Layer III 帧工具

/// 生成用帧参数: MPEG-1 Layer III, 32 kbps, 32 kHz, 单声道, 无 CRC
const SILENT_HEADER: [u8; 4] = [0xFF, 0xFB, 0x18, 0xC0];
const SILENT_FRAME_BYTES: usize = 144;
pub const SILENT_SAMPLE_RATE: u32 = 32_000;
pub const FRAME_SAMPLES: u64 = 1152;

/// 生成确定性的静音 MP3 流（整帧，时长向下取整到帧）
///
/// 边信息与主数据全零，解码结果为静音
pub fn silent_mp3(duration_ms: u64) -> Vec<u8> {
    let frames = duration_ms * SILENT_SAMPLE_RATE as u64 / 1000 / FRAME_SAMPLES;
    let mut out = Vec::with_capacity(frames as usize * SILENT_FRAME_BYTES);
    for _ in 0..frames {
        out.extend_from_slice(&SILENT_HEADER);
        out.resize(out.len() + SILENT_FRAME_BYTES - SILENT_HEADER.len(), 0);
    }
    out
}

/// 统计以帧同步字开头的连续 MPEG-1 Layer III 帧数
pub fn count_frames(data: &[u8]) -> usize {
    let mut pos = 0;
    let mut frames = 0;
    while pos + 4 <= data.len() {
        match frame_len(&data[pos..pos + 4]) {
            Some(len) if pos + len <= data.len() => {
                pos += len;
                frames += 1;
            }
            _ => break,
        }
    }
    frames
}

/// 由帧头计算整帧字节数
fn frame_len(header: &[u8]) -> Option<usize> {
    const BITRATES_KBPS: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
    const SAMPLE_RATES: [u32; 3] = [44_100, 48_000, 32_000];

    if header[0] != 0xFF || header[1] & 0xFE != 0xFA {
        return None;
    }
    let bitrate = *BITRATES_KBPS.get((header[2] >> 4) as usize)?;
    let sample_rate = *SAMPLE_RATES.get(((header[2] >> 2) & 0x03) as usize)?;
    if bitrate == 0 {
        return None;
    }
    let padding = ((header[2] >> 1) & 0x01) as u32;
    Some((144 * bitrate * 1000 / sample_rate + padding) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_stream_is_whole_frames() {
        let mp3 = silent_mp3(10_000);
        // 10s * 32000 / 1152 = 277 帧
        assert_eq!(mp3.len(), 277 * SILENT_FRAME_BYTES);
        assert_eq!(count_frames(&mp3), 277);
        assert_eq!(mp3, silent_mp3(10_000));
    }

    #[test]
    fn test_count_stops_at_non_frame() {
        let mut mp3 = silent_mp3(1000);
        let frames = count_frames(&mp3);
        mp3.extend_from_slice(b"TAG trailing");
        assert_eq!(count_frames(&mp3), frames);
        assert_eq!(count_frames(b"not mp3"), 0);
    }
}
