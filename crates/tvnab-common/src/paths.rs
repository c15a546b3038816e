//! Path utilities for recognising downloaded episode files.
//!
//! The renamer only files away video files; everything else a download client
//! leaves behind (nfo files, samples in other containers, partial downloads)
//! is ignored.

use std::path::Path;

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv",
];

/// Extensions download clients use for files that are still being written.
const PARTIAL_EXTENSIONS: &[&str] = &["part", "!ut", "tmp"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tvnab_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("Archer.S01E01.mkv")));
/// assert!(is_video_file(Path::new("/downloads/show/episode.mp4")));
/// assert!(!is_video_file(Path::new("episode.nfo")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

/// Check if a path looks like an unfinished download.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tvnab_common::paths::is_partial_download;
///
/// assert!(is_partial_download(Path::new("episode.mkv.part")));
/// assert!(!is_partial_download(Path::new("episode.mkv")));
/// ```
pub fn is_partial_download(path: &Path) -> bool {
    has_extension(path, PARTIAL_EXTENSIONS)
}
