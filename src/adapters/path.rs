use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use std::collections::HashSet;

use crate::domain::model::{ByteStream, FileEntry, UploadOptions, WriteOptions};
use crate::utils::error::{BridgeError, Result};

/// Normalizes a storage path: `\` becomes `/`, empty and `.` segments are
/// dropped, `..` is resolved. Leading and trailing slashes never survive.
pub fn normalize_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(BridgeError::invalid_argument(format!(
                        "Path is outside of the defined root, path: [{}]",
                        path
                    )));
                }
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Directory form of a path, always ending with exactly one `/`.
pub fn normalize_dir(path: &str) -> Result<String> {
    Ok(format!("{}/", normalize_path(path)?))
}

/// Like [`normalize_path`], but a trailing `/` marks a directory
/// placeholder and is kept.
pub fn normalize_entry(path: &str) -> Result<String> {
    let normalized = normalize_path(path)?;
    if !normalized.is_empty() && path.replace('\\', "/").ends_with('/') {
        Ok(format!("{}/", normalized))
    } else {
        Ok(normalized)
    }
}

/// Parent of `path`; the root is the empty string.
pub fn dirname(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
        .unwrap_or_default()
}

/// Adds `dir` entries for every ancestor of a listed item that the service
/// did not report itself.
pub fn emulate_directories(mut listing: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut listed: HashSet<String> = HashSet::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut emulated: Vec<String> = Vec::new();

    for entry in &listing {
        if entry.is_dir() {
            listed.insert(entry.path.trim_end_matches('/').to_string());
        }

        let mut parent = entry.dirname.clone().unwrap_or_default();
        while !parent.trim().is_empty() && !seen.contains(&parent) {
            seen.insert(parent.clone());
            emulated.push(parent.clone());
            parent = dirname(&parent);
        }
    }

    for directory in emulated {
        if !listed.contains(&directory) {
            let mut entry = FileEntry::dir(directory.clone());
            entry.dirname = Some(dirname(&directory));
            listing.push(entry);
        }
    }

    listing
}

/// Keeps what lies inside `directory` (direct children only unless
/// `recursive`), drops the directory itself, dedups and orders by path.
pub fn format_listing(directory: &str, recursive: bool, listing: Vec<FileEntry>) -> Vec<FileEntry> {
    let directory = directory.trim_matches('/');
    let scope = format!("{}/", directory);
    let mut seen = HashSet::new();

    let mut formatted: Vec<FileEntry> = listing
        .into_iter()
        .filter_map(|mut entry| {
            if entry.is_dir() {
                entry.path = entry.path.trim_end_matches('/').to_string();
            }
            if entry.path.is_empty() || entry.path == directory {
                return None;
            }

            let parent = dirname(&entry.path);
            let in_scope = if recursive {
                directory.is_empty() || entry.path.starts_with(&scope)
            } else {
                parent == directory
            };
            if !in_scope || !seen.insert(entry.path.clone()) {
                return None;
            }

            entry.dirname = Some(parent);
            Some(entry)
        })
        .collect();

    formatted.sort_by(|a, b| a.path.cmp(&b.path));
    formatted
}

/// Translates host write options into vendor content headers.
pub fn upload_options(path: &str, options: &WriteOptions) -> UploadOptions {
    let content_type = options
        .mimetype
        .clone()
        .or_else(|| options.content_type.clone())
        .or_else(|| {
            if path.ends_with('/') {
                None
            } else {
                mime_guess::from_path(path).first_raw().map(str::to_string)
            }
        });

    UploadOptions {
        content_type,
        cache_control: options.cache_control.clone(),
        content_language: options.content_language.clone(),
        content_encoding: options.content_encoding.clone(),
        metadata: options.metadata.clone(),
    }
}

pub async fn collect_stream(mut stream: ByteStream) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.try_next().await? {
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}
