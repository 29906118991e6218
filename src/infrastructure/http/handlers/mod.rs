//! HTTP Handlers

mod full;
mod lyrics;
mod ping;
mod query;
mod requester;
mod stats;

pub use full::*;
pub use lyrics::*;
pub use ping::*;
pub use query::*;
pub use requester::*;
pub use stats::*;

use axum::http::HeaderValue;

/// 将任意文本转成合法的响应头值，控制字符替换为空格
pub(crate) fn header_value(text: &str) -> HeaderValue {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    HeaderValue::from_bytes(cleaned.trim().as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_keeps_utf8_and_strips_control() {
        let value = header_value("Ta\tyl\nor 夜に駆ける");
        let bytes = value.as_bytes();
        assert!(!bytes.contains(&b'\n'));
        assert!(std::str::from_utf8(bytes).unwrap().contains("夜に駆ける"));
    }
}
