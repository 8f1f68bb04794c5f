//! Filename resolution, extension determination and full path assembly.
//!
//! The filename comes from, in order: the caller's override, the
//! `Content-Disposition` header, the last path segment of the redirect target,
//! the last path segment of the requested URL, and finally a synthesized
//! `fileN`. The extension comes from the content type, then the URL suffix,
//! then `.bin`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use url::Url;

use super::constants::{FALLBACK_EXTENSION, MAX_URL_EXTENSION_LEN, SYNTHETIC_FILENAME_STEM};
use super::fs_probe::{file_exists, sanitize_filename};
use super::metadata::RemoteMetadata;
use super::mime::extension_for_content_type;
use crate::event::{LogKind, LogValue, log_event};

/// Where a download will be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    /// Destination directory + filename (+ extension).
    pub full_path: PathBuf,
    /// Sanitized filename before the extension was appended.
    pub filename: String,
    /// Extension determined for the resource, leading dot included.
    pub extension: String,
}

/// Extracts the filename parameter of a `Content-Disposition` value.
///
/// `filename*` (RFC 5987, `charset'lang'percent-encoded`) wins over
/// `filename`. Quoted strings are parsed with backslash escapes, the result is
/// percent-decoded, and one unbalanced trailing quote is dropped.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let params = disposition_params(header);

    let extended = params
        .iter()
        .find(|(name, _)| name == "filename*")
        .and_then(|(_, value)| value.splitn(3, '\'').nth(2).map(str::to_string));
    let plain = || {
        params
            .iter()
            .find(|(name, _)| name == "filename")
            .map(|(_, value)| value.clone())
    };

    let raw = extended.or_else(plain)?;
    let decoded = urlencoding::decode(&raw).map_or_else(|_| raw.clone(), |d| d.into_owned());
    let cleaned = strip_unbalanced_trailing_quote(decoded.trim());
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn strip_unbalanced_trailing_quote(value: &str) -> &str {
    match value.strip_suffix('"') {
        Some(stripped) if !stripped.starts_with('"') => stripped,
        _ => value,
    }
}

/// Splits `type; name=value; name="quoted; value"` into lowercased names and values.
fn disposition_params(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let Some((_, mut rest)) = header.split_once(';') else {
        return params;
    };

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let eq = rest.find('=');
        let semi = rest.find(';');
        let eq = match (eq, semi) {
            (Some(eq), Some(semi)) if semi < eq => {
                // Parameter without a value.
                rest = &rest[semi + 1..];
                continue;
            }
            (Some(eq), _) => eq,
            (None, _) => break,
        };

        let name = rest[..eq].trim().to_ascii_lowercase();
        let after = rest[eq + 1..].trim_start();

        if let Some(quoted) = after.strip_prefix('"') {
            let mut value = String::new();
            let mut escaped = false;
            let mut end = quoted.len();
            for (i, c) in quoted.char_indices() {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    end = i + 1;
                    break;
                } else {
                    value.push(c);
                }
            }
            params.push((name, value));
            let tail = &quoted[end..];
            rest = tail.find(';').map_or("", |i| &tail[i + 1..]);
        } else {
            let (value, tail) = match after.find(';') {
                Some(i) => (&after[..i], &after[i + 1..]),
                None => (after, ""),
            };
            params.push((name, value.trim().to_string()));
            rest = tail;
        }
    }

    params
}

/// Returns the last path segment of `url` with query, fragment and trailing
/// `&`-arguments removed, percent-decoded. Empty segments yield `None`.
#[must_use]
pub fn last_path_segment(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)?,
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or("");
            path.rsplit_once('/')?.1.to_string()
        }
    };

    let segment = segment.split(['?', '&']).next().unwrap_or("");
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).map_or_else(
        |e| {
            debug!(segment, error = %e, "URL decoding failed, using raw segment");
            segment.to_string()
        },
        |d| d.into_owned(),
    );
    (!decoded.is_empty()).then_some(decoded)
}

/// Extension after the last `.` of the URL's last path segment, lowercased.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let dot = segment.rfind('.')?;
    let ext = &segment[dot..];
    if ext.len() <= 1 || ext.len() > MAX_URL_EXTENSION_LEN || ext.contains(char::is_whitespace)
    {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Determines the extension from the content type, falling back to the URL
/// suffix (the redirect target when there was one).
#[must_use]
pub fn determine_extension(url: &str, metadata: &RemoteMetadata) -> Option<String> {
    if let Some(ext) = extension_for_content_type(&metadata.content_type) {
        return Some(ext.to_string());
    }
    let effective = metadata.redirect_location.as_deref().unwrap_or(url);
    extension_from_url(effective).or_else(|| extension_from_url(url))
}

/// Synthesizes `fileN` with the smallest `N >= 1` for which `fileN<extension>`
/// does not exist in `dir`.
#[must_use]
pub fn synthesize_filename(dir: &Path, extension: &str) -> String {
    (1_u64..)
        .map(|n| format!("{SYNTHETIC_FILENAME_STEM}{n}"))
        .find(|name| !file_exists(&dir.join(format!("{name}{extension}"))))
        .unwrap_or_else(|| SYNTHETIC_FILENAME_STEM.to_string())
}

/// Resolves the sanitized filename (without forced extension) for a download.
pub fn resolve_filename(
    url: &str,
    override_name: Option<&str>,
    metadata: &RemoteMetadata,
    dir: &Path,
    extension: &str,
) -> String {
    let candidate = override_name
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            metadata
                .content_disposition
                .as_deref()
                .and_then(parse_content_disposition)
        })
        .or_else(|| {
            metadata
                .redirect_location
                .as_deref()
                .and_then(last_path_segment)
        })
        .or_else(|| last_path_segment(url));

    let sanitized = candidate.map(|name| sanitize_filename(&name).trim().to_string());
    match sanitized {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => {
            log_event(LogKind::FilenameUnknown, Some(LogValue::from(url)));
            synthesize_filename(dir, extension)
        }
    }
}

/// Joins `dir` and `filename`, appending `extension` unless `append` is false
/// or the name already ends with it (case-insensitively).
#[must_use]
pub fn assemble_full_path(dir: &Path, filename: &str, extension: &str, append: bool) -> PathBuf {
    let has_extension = filename
        .to_lowercase()
        .ends_with(&extension.to_lowercase());
    if append && !has_extension {
        dir.join(format!("{filename}{extension}"))
    } else {
        dir.join(filename)
    }
}

/// Resolves where a download of `url` into `dir` will be written.
///
/// A redirect whose content type maps to `.html` keeps the redirect-derived
/// name as-is; API redirect targets are rarely HTML documents.
pub fn resolve_target(
    url: &str,
    override_name: Option<&str>,
    metadata: &RemoteMetadata,
    dir: &Path,
) -> ResolvedTarget {
    let extension = determine_extension(url, metadata).unwrap_or_else(|| {
        log_event(LogKind::FiletypeUnknown, Some(LogValue::from(url)));
        FALLBACK_EXTENSION.to_string()
    });
    let filename = resolve_filename(url, override_name, metadata, dir, &extension);
    let append = !(metadata.redirect_location.is_some() && extension == ".html");
    let full_path = assemble_full_path(dir, &filename, &extension, append);
    debug!(path = %full_path.display(), %extension, append, "resolved target");

    ResolvedTarget {
        full_path,
        filename,
        extension,
    }
}
