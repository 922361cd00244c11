// Master and media playlist parsing.
//
// Only the tags the downloader acts on are interpreted; every other tag is
// skipped so newer playlist features never cause a hard failure.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::hls::uri::resolve;

const TAG_STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const TAG_KEY: &str = "#EXT-X-KEY:";
const TAG_SESSION_KEY: &str = "#EXT-X-SESSION-KEY:";
const TAG_INF: &str = "#EXTINF:";
const TAG_MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";

const NOISE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".ico", ".css", ".js", ".html", ".txt",
];

static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*[xX]\s*(\d+)\s*$").expect("valid resolution regex"));

static MEDIA_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(ts|m4s|mp4)(\?|$)").expect("valid media extension regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Parses `WIDTHxHEIGHT`. Anything else yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = RESOLUTION_RE.captures(s)?;
        let width = caps.get(1)?.as_str().parse().ok()?;
        let height = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One rendition listed in a master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub uri: String,
    pub bandwidth: Option<u64>,
    pub resolution: Option<Resolution>,
}

impl Variant {
    pub fn height(&self) -> u32 {
        self.resolution.map(|r| r.height).unwrap_or(0)
    }

    pub fn bandwidth_or_zero(&self) -> u64 {
        self.bandwidth.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum KeyMethod {
    #[default]
    None,
    Aes128,
    Other(String),
}

impl KeyMethod {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NONE") {
            KeyMethod::None
        } else if s.eq_ignore_ascii_case("AES-128") {
            KeyMethod::Aes128
        } else {
            KeyMethod::Other(s.to_string())
        }
    }
}

impl fmt::Display for KeyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMethod::None => f.write_str("NONE"),
            KeyMethod::Aes128 => f.write_str("AES-128"),
            KeyMethod::Other(m) => f.write_str(m),
        }
    }
}

/// Encryption state active for a run of segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub method: KeyMethod,
    pub uri: Option<String>,
    pub iv: Option<[u8; 16]>,
}

impl KeyInfo {
    /// The IV to decrypt segment `sequence` with: the explicit one if the
    /// playlist gave it, the big-endian sequence number otherwise.
    pub fn iv_for(&self, sequence: u64) -> [u8; 16] {
        self.iv
            .unwrap_or_else(|| (sequence as u128).to_be_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Absolute URI
    pub uri: String,
    pub duration: Option<f64>,
    pub key: KeyInfo,
    pub sequence: u64,
}

/// Splits an attribute list on commas that are not inside quotes and returns
/// `(UPPERCASE_KEY, unquoted value)` pairs.
fn parse_attributes(list: &str) -> Vec<(String, String)> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in list.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .filter_map(|item| {
            let (key, value) = item.split_once('=')?;
            let key = key.trim().to_ascii_uppercase();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((key, value.to_string()))
        })
        .collect()
}

fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn parse_iv(raw: &str) -> Option<[u8; 16]> {
    let hex_str = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if hex_str.is_empty() || hex_str.len() > 32 {
        return None;
    }
    let padded = format!("{hex_str:0>32}");
    let bytes = hex::decode(padded).ok()?;
    bytes.try_into().ok()
}

fn parse_key(attr_list: &str, base_url: &str) -> KeyInfo {
    let attrs = parse_attributes(attr_list);
    let method = attribute(&attrs, "METHOD")
        .map(KeyMethod::parse)
        .unwrap_or_default();
    let uri = attribute(&attrs, "URI")
        .filter(|u| !u.is_empty())
        .map(|u| resolve(base_url, u));
    let iv = attribute(&attrs, "IV").and_then(|raw| {
        let iv = parse_iv(raw);
        if iv.is_none() {
            warn!(iv = raw, "Ignoring malformed IV, falling back to sequence number");
        }
        iv
    });
    KeyInfo { method, uri, iv }
}

fn is_media_uri(uri: &str) -> bool {
    if MEDIA_URI_RE.is_match(uri) {
        return true;
    }
    let lower = uri.to_ascii_lowercase();
    !NOISE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// True when the text lists variants rather than segments.
pub fn is_master_playlist(text: &str) -> bool {
    text.contains("#EXT-X-STREAM-INF")
}

/// Parses the variants of a master playlist, in source order.
pub fn parse_master_playlist(text: &str, base_url: &str) -> Vec<Variant> {
    let mut variants = Vec::new();
    let mut pending: Option<Vec<(String, String)>> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(TAG_STREAM_INF) {
            pending = Some(parse_attributes(rest));
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some(attrs) = pending.take() else {
            continue;
        };

        let bandwidth = attribute(&attrs, "BANDWIDTH").and_then(|b| b.parse().ok());
        let resolution = attribute(&attrs, "RESOLUTION").and_then(|r| {
            let parsed = Resolution::parse(r);
            if parsed.is_none() {
                debug!(resolution = r, "Dropping malformed RESOLUTION attribute");
            }
            parsed
        });
        variants.push(Variant {
            uri: resolve(base_url, line),
            bandwidth,
            resolution,
        });
    }

    variants
}

/// Parses the segments of a media playlist.
///
/// Each segment carries a copy of the key active at its line, and sequence
/// numbers start at `#EXT-X-MEDIA-SEQUENCE` (0 when absent).
pub fn parse_media_playlist(text: &str, base_url: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current_key = KeyInfo::default();
    let mut sequence: u64 = 0;
    let mut pending_duration: Option<f64> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(TAG_MEDIA_SEQUENCE) {
            match rest.trim().parse() {
                Ok(n) => sequence = n,
                Err(_) => debug!(value = rest, "Ignoring malformed media sequence"),
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix(TAG_INF) {
            let raw = rest.split(',').next().unwrap_or_default().trim();
            pending_duration = raw.parse().ok().filter(|d: &f64| d.is_finite());
            continue;
        }
        if let Some(rest) = line.strip_prefix(TAG_KEY) {
            current_key = parse_key(rest, base_url);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let uri = resolve(base_url, line);
        if !is_media_uri(&uri) {
            debug!(uri = %uri, "Skipping non-media playlist entry");
            continue;
        }
        segments.push(Segment {
            uri,
            duration: pending_duration.take(),
            key: current_key.clone(),
            sequence,
        });
        sequence = sequence.wrapping_add(1);
    }

    segments
}

/// Scans playlist text for encryption the downloader refuses to handle.
/// Returns a description of the first offending key tag.
pub fn detect_unsupported_drm(text: &str) -> Option<String> {
    for line in text.lines().map(str::trim) {
        let Some(attr_list) = line
            .strip_prefix(TAG_KEY)
            .or_else(|| line.strip_prefix(TAG_SESSION_KEY))
        else {
            continue;
        };
        let attrs = parse_attributes(attr_list);
        let method = attribute(&attrs, "METHOD")
            .map(KeyMethod::parse)
            .unwrap_or_default();
        if let KeyMethod::Other(name) = &method {
            return Some(format!("METHOD={name}"));
        }
        if method == KeyMethod::None {
            continue;
        }
        if let Some(format) = attribute(&attrs, "KEYFORMAT")
            && !format.eq_ignore_ascii_case("identity")
        {
            return Some(format!("KEYFORMAT={format}"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/vod/master.m3u8";

    #[test]
    fn test_parse_master_in_source_order() {
        let text = "#EXTM3U\n\
            #EXT-X-VERSION:3\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"\n\
            360p/index.m3u8\n\
            \n\
            #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n\
            # a comment between tag and uri\n\
            720p/index.m3u8\n\
            #EXT-X-STREAM-INF:resolution=1920x1080,bandwidth=5000000\n\
            https://other.example.com/1080p.m3u8\n";

        let variants = parse_master_playlist(text, BASE);
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].uri, "https://cdn.example.com/vod/360p/index.m3u8");
        assert_eq!(variants[0].bandwidth, Some(800_000));
        assert_eq!(
            variants[0].resolution,
            Some(Resolution {
                width: 640,
                height: 360
            })
        );
        assert_eq!(variants[1].uri, "https://cdn.example.com/vod/720p/index.m3u8");
        assert_eq!(variants[2].uri, "https://other.example.com/1080p.m3u8");
        assert_eq!(variants[2].bandwidth, Some(5_000_000));
        assert_eq!(variants[2].height(), 1080);
    }

    #[test]
    fn test_master_malformed_attributes_are_dropped() {
        let text = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=abc,RESOLUTION=wide\n\
            low.m3u8\n";
        let variants = parse_master_playlist(text, BASE);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].bandwidth, None);
        assert_eq!(variants[0].resolution, None);
    }

    #[test]
    fn test_uri_without_stream_inf_is_ignored() {
        let text = "#EXTM3U\nstray.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=1\nreal.m3u8\n";
        let variants = parse_master_playlist(text, BASE);
        assert_eq!(variants.len(), 1);
        assert!(variants[0].uri.ends_with("/real.m3u8"));
    }

    #[test]
    fn test_is_master_playlist() {
        assert!(is_master_playlist("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\na.m3u8"));
        assert!(!is_master_playlist("#EXTM3U\n#EXTINF:4,\na.ts"));
    }

    #[test]
    fn test_parse_media_sequence_and_durations() {
        let text = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:6\n\
            #EXT-X-MEDIA-SEQUENCE:100\n\
            #EXTINF:6.006,\n\
            seg100.ts\n\
            #EXTINF:bogus,\n\
            seg101.ts\n\
            seg102.ts\n\
            #EXT-X-ENDLIST\n";
        let segments = parse_media_playlist(text, "https://cdn.example.com/v/index.m3u8");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].sequence, 100);
        assert_eq!(segments[0].duration, Some(6.006));
        assert_eq!(segments[0].uri, "https://cdn.example.com/v/seg100.ts");
        assert_eq!(segments[1].sequence, 101);
        assert_eq!(segments[1].duration, None);
        assert_eq!(segments[2].sequence, 102);
        assert_eq!(segments[2].duration, None);
    }

    #[test]
    fn test_bad_media_sequence_keeps_counter() {
        let text = "#EXT-X-MEDIA-SEQUENCE:oops\n#EXTINF:4,\na.ts\n";
        let segments = parse_media_playlist(text, BASE);
        assert_eq!(segments[0].sequence, 0);
    }

    #[test]
    fn test_noise_lines_filtered() {
        let text = "#EXTM3U\n\
            #EXTINF:4,\n\
            a.ts\n\
            banner.jpg\n\
            #EXTINF:4,\n\
            b.ts?token=abc\n\
            style.css\n\
            #EXTINF:4,\n\
            c.m4s\n\
            chunk-no-extension\n";
        let segments = parse_media_playlist(text, BASE);
        let uris: Vec<_> = segments.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "https://cdn.example.com/vod/a.ts",
                "https://cdn.example.com/vod/b.ts?token=abc",
                "https://cdn.example.com/vod/c.m4s",
                "https://cdn.example.com/vod/chunk-no-extension",
            ]
        );
        // Filtered lines do not consume a sequence number
        let seqs: Vec<_> = segments.iter().map(|s| s.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_noise_extension_matched_on_full_uri() {
        let text = "#EXTINF:4,\n\
            a.ts\n\
            get?file=banner.png\n\
            #EXTINF:4,\n\
            chunk.jpg?v=1\n\
            #EXTINF:4,\n\
            seg.mp4?a=1&name=thumb.png\n";
        let segments = parse_media_playlist(text, BASE);
        let uris: Vec<_> = segments.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "https://cdn.example.com/vod/a.ts",
                "https://cdn.example.com/vod/chunk.jpg?v=1",
                "https://cdn.example.com/vod/seg.mp4?a=1&name=thumb.png",
            ]
        );
    }

    #[test]
    fn test_media_sequence_at_u64_max_wraps() {
        let text = "#EXT-X-MEDIA-SEQUENCE:18446744073709551615\n\
            #EXTINF:4,\n\
            a.ts\n\
            #EXTINF:4,\n\
            b.ts\n";
        let segments = parse_media_playlist(text, BASE);
        let seqs: Vec<_> = segments.iter().map(|s| s.sequence).collect();
        assert_eq!(seqs, vec![u64::MAX, 0]);
    }

    #[test]
    fn test_key_snapshot_per_segment() {
        let text = "#EXTM3U\n\
            #EXTINF:4,\n\
            clear.ts\n\
            #EXT-X-KEY:METHOD=AES-128,URI=\"keys/k1.bin\",IV=0x000102030405060708090a0b0c0d0e0f\n\
            #EXTINF:4,\n\
            enc1.ts\n\
            #EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example.com/k2\"\n\
            #EXTINF:4,\n\
            enc2.ts\n\
            #EXT-X-KEY:METHOD=NONE\n\
            #EXTINF:4,\n\
            clear2.ts\n";
        let segments = parse_media_playlist(text, BASE);
        assert_eq!(segments.len(), 4);

        assert_eq!(segments[0].key, KeyInfo::default());

        assert_eq!(segments[1].key.method, KeyMethod::Aes128);
        assert_eq!(
            segments[1].key.uri.as_deref(),
            Some("https://cdn.example.com/vod/keys/k1.bin")
        );
        let expected_iv: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert_eq!(segments[1].key.iv, Some(expected_iv));

        assert_eq!(
            segments[2].key.uri.as_deref(),
            Some("https://keys.example.com/k2")
        );
        assert_eq!(segments[2].key.iv, None);
        assert_eq!(segments[3].key.method, KeyMethod::None);
    }

    #[test]
    fn test_iv_for_sequence() {
        let key = KeyInfo {
            method: KeyMethod::Aes128,
            uri: Some("k".into()),
            iv: None,
        };
        let iv = key.iv_for(258);
        assert_eq!(&iv[..14], &[0u8; 14]);
        assert_eq!(&iv[14..], &[1, 2]);

        let explicit = KeyInfo {
            iv: Some([7; 16]),
            ..key
        };
        assert_eq!(explicit.iv_for(258), [7; 16]);
    }

    #[test]
    fn test_short_iv_is_left_padded() {
        assert_eq!(
            parse_iv("0x1"),
            Some({
                let mut iv = [0u8; 16];
                iv[15] = 1;
                iv
            })
        );
        assert_eq!(parse_iv("0xZZ"), None);
        assert_eq!(parse_iv(&format!("0x{}", "f".repeat(34))), None);
    }

    #[test]
    fn test_attribute_quotes_protect_commas() {
        let attrs = parse_attributes("METHOD=AES-128,URI=\"k?a=1,b=2\",IV=0x01");
        assert_eq!(attribute(&attrs, "URI"), Some("k?a=1,b=2"));
        assert_eq!(attribute(&attrs, "IV"), Some("0x01"));
    }

    #[test]
    fn test_detect_drm() {
        assert_eq!(
            detect_unsupported_drm("#EXTM3U\n#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"skd://x\"\n"),
            Some("METHOD=SAMPLE-AES".to_string())
        );
        assert!(
            detect_unsupported_drm(
                "#EXT-X-SESSION-KEY:METHOD=AES-128,URI=\"k\",KEYFORMAT=\"com.apple.streamingkeydelivery\"\n"
            )
            .is_some()
        );
        assert_eq!(
            detect_unsupported_drm(
                "#EXT-X-KEY:METHOD=AES-128,URI=\"k\",KEYFORMAT=\"identity\"\n#EXT-X-KEY:METHOD=NONE\n"
            ),
            None
        );
        assert_eq!(detect_unsupported_drm("#EXTINF:4,\na.ts\n"), None);
    }
}
