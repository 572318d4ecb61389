//! URL classification for supported source patterns
//!
//! A submitted URL is matched as a prefix against the supported patterns.
//! Scheme and host match case-insensitively, the path is case-sensitive.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::models::UrlKind;

lazy_static! {
    static ref WATCH_RE: Regex =
        Regex::new(r"^(?i:https?://(?:www\.)?youtube\.com)/watch\?v=[A-Za-z0-9_-]+")
            .unwrap();
    static ref PLAYLIST_RE: Regex =
        Regex::new(r"^(?i:https?://(?:www\.)?youtube\.com)/playlist\?list=[A-Za-z0-9_-]+")
            .unwrap();
    static ref SHORT_RE: Regex =
        Regex::new(r"^(?i:https?://youtu\.be)/[A-Za-z0-9_-]+").unwrap();
    static ref HANDLE_RE: Regex =
        Regex::new(r"^(?i:https?://(?:www\.)?youtube\.com)/[A-Za-z0-9@._-]+").unwrap();
}

/// Classify a URL into one of the supported kinds.
///
/// Matching is total: anything that fits no pattern (including the empty
/// string) comes back as [`UrlKind::Invalid`], never a panic.
pub fn classify(url: &str) -> UrlKind {
    if url.is_empty() {
        return UrlKind::Invalid;
    }
    if WATCH_RE.is_match(url) {
        return UrlKind::Single;
    }
    if PLAYLIST_RE.is_match(url) {
        return UrlKind::Playlist;
    }
    if SHORT_RE.is_match(url) {
        return UrlKind::Single;
    }
    if HANDLE_RE.is_match(url) {
        return UrlKind::Single;
    }
    UrlKind::Invalid
}

/// Whether playlist expansion is allowed for this URL.
///
/// This is a deliberately loose substring check, independent of
/// [`classify`]: any URL containing "playlist" anywhere allows expansion,
/// even one classified as a single video.
pub fn allows_playlist(url: &str) -> bool {
    url.contains("playlist")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_url() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            UrlKind::Single
        );
        assert_eq!(
            classify("http://youtube.com/watch?v=abc123_-"),
            UrlKind::Single
        );
    }

    #[test]
    fn test_classify_playlist_url() {
        assert_eq!(
            classify("https://www.youtube.com/playlist?list=PLabc123"),
            UrlKind::Playlist
        );
    }

    #[test]
    fn test_classify_short_url() {
        assert_eq!(classify("https://youtu.be/dQw4w9WgXcQ"), UrlKind::Single);
    }

    #[test]
    fn test_classify_handle_url() {
        assert_eq!(
            classify("https://www.youtube.com/@SomeChannel"),
            UrlKind::Single
        );
    }

    #[test]
    fn test_classify_invalid() {
        assert_eq!(classify(""), UrlKind::Invalid);
        assert_eq!(classify("not a url"), UrlKind::Invalid);
        assert_eq!(classify("https://example.com/watch?v=abc"), UrlKind::Invalid);
        assert_eq!(classify("ftp://youtube.com/watch?v=abc"), UrlKind::Invalid);
    }

    #[test]
    fn test_scheme_and_host_case_insensitive() {
        assert_eq!(
            classify("HTTPS://WWW.YOUTUBE.COM/watch?v=dQw4w9WgXcQ"),
            UrlKind::Single
        );
    }

    #[test]
    fn test_path_case_sensitive() {
        assert_eq!(
            classify("https://www.youtube.com/WATCH?v=dQw4w9WgXcQ"),
            // the uppercase path still matches the generic channel pattern
            UrlKind::Single
        );
        assert_eq!(
            classify("https://youtu.be/"),
            UrlKind::Invalid
        );
    }

    #[test]
    fn test_prefix_match_tolerates_trailing_params() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            UrlKind::Single
        );
    }

    #[test]
    fn test_allows_playlist_is_substring_check() {
        assert!(allows_playlist("https://www.youtube.com/playlist?list=PL1"));
        assert!(allows_playlist("https://example.com/my-playlist-page"));
        assert!(!allows_playlist("https://www.youtube.com/watch?v=abc"));
        assert!(!allows_playlist(""));
    }
}
