use once_cell::sync::Lazy;
use regex::Regex;

static VIDEO_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtu\.be/|youtube\.com(?:/embed/|/v/|/shorts/|/watch\?v=|/watch\?.+&v=))(?<id>[^&\n?#/]+)",
    )
    .expect("Invalid regex")
});

pub fn video_id(url: &str) -> Option<&str> {
    VIDEO_ID_REGEX
        .captures(url)
        .and_then(|x| x.name("id"))
        .map(|x| x.as_str())
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_watch_url() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn id_from_watch_url_with_other_params_first() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10"),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn id_from_short_forms() {
        assert_eq!(video_id("https://youtu.be/abc123?si=x"), Some("abc123"));
        assert_eq!(video_id("https://youtube.com/shorts/Zx9"), Some("Zx9"));
        assert_eq!(video_id("https://www.youtube.com/embed/Q1w2"), Some("Q1w2"));
    }

    #[test]
    fn no_id_for_other_sites() {
        assert_eq!(video_id("https://www.tiktok.com/@a/video/1"), None);
    }
}
