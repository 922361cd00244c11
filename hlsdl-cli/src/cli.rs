use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "HLS stream downloader",
    long_about = "Downloads an HLS stream (or a direct media URL) and reassembles it into\n\
                  a single playable file.\n\
                  \n\
                  Master playlists are resolved to one variant by resolution or bandwidth\n\
                  preference, AES-128 segments are decrypted, and the result is remuxed\n\
                  to MP4 with ffmpeg unless --no-remux is given. DRM protected streams\n\
                  (SAMPLE-AES and similar) are rejected."
)]
pub struct CliArgs {
    /// Source URL (media playlist, master playlist or direct media file)
    #[arg(required = true, help = "Source URL (direct media or .m3u8)")]
    pub url: String,

    /// Output file path
    #[arg(
        short,
        long,
        help = "Output file path. Derived from the URL under --downloads-dir when omitted"
    )]
    pub out: Option<PathBuf>,

    /// Base directory for derived output paths
    #[arg(long, default_value = "downloads", help = "Directory used when --out is not given")]
    pub downloads_dir: PathBuf,

    /// Download mode
    #[arg(
        long,
        default_value = "auto",
        value_parser = ["auto", "http", "hls"],
        help = "Download mode. 'auto' picks HLS when the URL contains .m3u8"
    )]
    pub mode: String,

    #[arg(long = "ua", help = "User-Agent header")]
    pub user_agent: Option<String>,

    #[arg(long = "referer", visible_alias = "ref", help = "Referer header")]
    pub referer: Option<String>,

    #[arg(long, help = "Cookie header string")]
    pub cookies: Option<String>,

    #[arg(long, help = "Origin header")]
    pub origin: Option<String>,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    #[arg(long = "res", help = "Preferred resolution for HLS, e.g. 1920x1080")]
    pub resolution: Option<String>,

    #[arg(long = "bw", help = "Preferred maximum bandwidth for HLS in bps (k/m suffixes accepted)")]
    pub bandwidth: Option<String>,

    /// Number of concurrent HLS segment downloads
    #[arg(
        long = "conc",
        default_value = "4",
        help = "Maximum number of concurrent segment downloads"
    )]
    pub concurrency: u32,

    /// Segment retry attempts
    #[arg(
        long,
        default_value = "3",
        help = "Number of retry attempts for failed segment downloads"
    )]
    pub retries: u32,

    #[arg(long, help = "Do not remux HLS to MP4 (keep .ts)")]
    pub no_remux: bool,

    #[arg(long, default_value = "ffmpeg", help = "Path to the ffmpeg executable")]
    pub ffmpeg: PathBuf,

    #[arg(
        long,
        help = "Keep segment files in this directory so an interrupted download can resume"
    )]
    pub work_dir: Option<PathBuf>,

    #[arg(long, help = "Keep segment files in --work-dir after assembly")]
    pub keep_segments: bool,

    #[arg(long, help = "Print the variants of a master playlist and exit")]
    pub list_variants: bool,

    #[arg(long, help = "Print every download event as a JSON line instead of a progress bar")]
    pub json_events: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Overall request timeout in seconds
    #[arg(
        long,
        default_value = "0",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    #[arg(
        long,
        default_value = "30",
        help = "Timeout for individual segment downloads in seconds"
    )]
    pub segment_timeout: u64,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(
        long,
        help = "Proxy server URL for downloads (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type (http, https, socks5, all)
    #[arg(
        long,
        default_value = "all",
        help = "Proxy type (http, https, socks5, all)",
        value_parser = ["http", "https", "socks5", "all"]
    )]
    pub proxy_type: String,

    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// Disable all proxy settings for downloads
    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy) for downloads"
    )]
    pub no_proxy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["hlsdl", "https://a.example/x.m3u8"]).unwrap();
        assert_eq!(args.concurrency, 4);
        assert_eq!(args.mode, "auto");
        assert!(!args.no_remux);
        assert!(args.out.is_none());
        assert_eq!(args.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_headers_and_preferences() {
        let args = CliArgs::try_parse_from([
            "hlsdl",
            "https://a.example/x.m3u8",
            "--ref",
            "https://page.example/",
            "-H",
            "X-Token: abc",
            "-H",
            "Accept: */*",
            "--res",
            "1280x720",
            "--bw",
            "3000k",
            "--conc",
            "8",
            "--no-remux",
        ])
        .unwrap();
        assert_eq!(args.referer.as_deref(), Some("https://page.example/"));
        assert_eq!(args.headers.len(), 2);
        assert_eq!(args.resolution.as_deref(), Some("1280x720"));
        assert_eq!(args.bandwidth.as_deref(), Some("3000k"));
        assert_eq!(args.concurrency, 8);
        assert!(args.no_remux);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(CliArgs::try_parse_from(["hlsdl", "u", "--mode", "ftp"]).is_err());
    }
}
