//! Static content-type to file extension table.

/// Known content types and the extension (leading dot) files of that type get.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("application/pgp-signature", ".sig"),
    ("application/futuresplash", ".spl"),
    ("application/octet-stream", ".bin"),
    ("application/postscript", ".ps"),
    ("application/x-bittorrent", ".torrent"),
    ("application/x-dvi", ".dvi"),
    ("application/gzip", ".gz"),
    ("application/x-gzip", ".gz"),
    ("application/x-tar", ".tar"),
    ("application/x-tgz", ".tar.gz"),
    ("application/x-bzip", ".bz2"),
    ("application/x-bzip2", ".bz2"),
    ("application/x-bzip-compressed-tar", ".tar.bz2"),
    ("application/x-xz", ".xz"),
    ("application/x-7z-compressed", ".7z"),
    ("application/zip", ".zip"),
    ("application/x-iso9660-image", ".iso"),
    ("application/x-ns-proxy-autoconfig", ".pac"),
    ("application/x-shockwave-flash", ".swf"),
    ("application/json", ".json"),
    ("application/xml", ".xml"),
    ("application/javascript", ".js"),
    ("application/epub+zip", ".epub"),
    ("application/ogg", ".ogg"),
    ("audio/mpeg", ".mp3"),
    ("audio/x-mpegurl", ".m3u"),
    ("audio/x-ms-wma", ".wma"),
    ("audio/x-ms-wax", ".wax"),
    ("audio/x-wav", ".wav"),
    ("audio/wav", ".wav"),
    ("audio/mp4", ".m4a"),
    ("audio/flac", ".flac"),
    ("audio/ogg", ".ogg"),
    ("image/gif", ".gif"),
    ("image/jpeg", ".jpg"),
    ("image/jpg", ".jpg"),
    ("image/png", ".png"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
    ("image/x-xbitmap", ".xbm"),
    ("image/x-xpixmap", ".xpm"),
    ("image/x-xwindowdump", ".xwd"),
    ("text/css", ".css"),
    ("text/csv", ".csv"),
    ("text/html", ".html"),
    ("text/javascript", ".js"),
    ("text/markdown", ".md"),
    ("text/plain", ".txt"),
    ("text/xml", ".xml"),
    ("video/mpeg", ".mpeg"),
    ("video/quicktime", ".mov"),
    ("video/x-flv", ".flv"),
    ("video/x-ms-asf", ".asf"),
    ("video/x-ms-wmv", ".wmv"),
    ("video/x-msvideo", ".avi"),
    ("video/x-matroska", ".mkv"),
    ("video/mp4", ".mp4"),
    ("video/webm", ".webm"),
];

/// Looks up the extension for a content type.
///
/// Parameters such as `; charset=utf-8` are ignored and matching is
/// case-insensitive. Unmapped types yield `None`.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    if essence.is_empty() {
        return None;
    }
    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}
