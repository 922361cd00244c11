use std::path::{Path, PathBuf};

use crate::error::AppError;

const MEDIA_EXTENSIONS: [&str; 6] = ["m3u8", "ts", "mp4", "mkv", "avi", "mov"];

/// Creates all directories in the given path, including parent directories if they don't exist.
#[inline]
pub async fn create_dirs(path: &Path) -> Result<(), AppError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(AppError::Io)?;
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derives `<downloads_dir>/<host>/<name>.mp4` from a source URL.
///
/// The last non-empty path segment (ignoring `index.html`) names the file.
/// Known media extensions are swapped for `.mp4`, anything else gets `.mp4`
/// appended. Unparseable URLs fall back to `<downloads_dir>/video.mp4`.
pub fn derive_output_from_url(url_str: &str, downloads_dir: &Path) -> PathBuf {
    let Ok(url) = url_str.parse::<reqwest::Url>() else {
        return downloads_dir.join("video.mp4");
    };

    let domain = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => "unknown".to_string(),
    };

    let last = url
        .path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !s.is_empty() && *s != "index.html")
                .next_back()
        })
        .map(str::to_string);

    let filename = match last {
        Some(name) => match name.rsplit_once('.') {
            Some((stem, ext)) if MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
                format!("{stem}.mp4")
            }
            _ => format!("{name}.mp4"),
        },
        None => "video.mp4".to_string(),
    };

    downloads_dir.join(sanitize(&domain)).join(sanitize(&filename))
}
