//! Built-in plugin folder loader.
//!
//! Reads a compiled plugin folder the way the host does when it boots from
//! the filesystem, and folds every file into a single plugin tiddler whose
//! `text` holds the embedded shadow tiddlers.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};
use twpack_plugin::{
    Plugin, PluginError, PluginLoader, PluginResult, TiddlerRecord, to_host_json,
};
use walkdir::WalkDir;

/// Manifest file name inside a plugin folder.
pub const PLUGIN_INFO: &str = "plugin.info";

/// File name of the host's per-directory loading directives.
const FILES_DIRECTIVE: &str = "tiddlywiki.files";

/// File and directory names the host never loads.
static EXCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\.DS_Store$|^.*\.meta$|^\..*\.swp$|^\._.*$|^\.git$|^\.github$|^\.vscode$|^\.hg$|^\.lock-wscript$|^\.svn$|^\.wafpickle-.*$|^CVS$|^npm-debug\.log$",
    )
    .expect("exclusion pattern is valid")
});

/// Loads plugin folders without an external host.
#[derive(Debug, Default)]
pub struct NativeLoader {
    booted: bool,
}

impl NativeLoader {
    /// Creates a loader; it must be booted before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for NativeLoader {
    fn name(&self) -> &str {
        "native"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Loads plugin folders with the built-in reader"
    }
}

impl PluginLoader for NativeLoader {
    fn boot(&mut self, invocation: &[String]) -> PluginResult<()> {
        if invocation.is_empty() {
            return Err(PluginError::InitFailed(
                "refusing to boot with an empty invocation".to_string(),
            ));
        }
        self.booted = true;
        Ok(())
    }

    fn load_plugin(&self, folder: &Path) -> PluginResult<TiddlerRecord> {
        if !self.booted {
            return Err(PluginError::InitFailed(
                "loader used before boot".to_string(),
            ));
        }
        if !folder.is_dir() {
            return Err(PluginError::load_failed(folder, "plugin folder not found"));
        }

        let info_path = folder.join(PLUGIN_INFO);
        if !info_path.is_file() {
            return Err(PluginError::load_failed(folder, "missing plugin.info"));
        }
        let info: Value = serde_json::from_str(&fs::read_to_string(&info_path)?)
            .map_err(|e| PluginError::load_failed(&info_path, e.to_string()))?;
        let mut plugin = TiddlerRecord::from_value(info)
            .ok_or_else(|| PluginError::load_failed(&info_path, "not a JSON object"))?;
        let Some(title) = plugin.title().map(str::to_string) else {
            return Err(PluginError::load_failed(&info_path, "missing title"));
        };

        let tiddlers = load_tiddlers(folder, &title)?;
        debug!(plugin = %title, tiddlers = tiddlers.len(), "loaded plugin folder");

        let mut wrapper = Map::new();
        wrapper.insert("tiddlers".to_string(), Value::Object(tiddlers));
        let text = to_host_json(&wrapper)
            .map_err(|e| PluginError::load_failed(folder, e.to_string()))?;

        plugin.insert("text", text);
        plugin.insert("type", "application/json");
        if !plugin.contains("plugin-type") {
            plugin.insert("plugin-type", "plugin");
        }
        if !plugin.contains("dependents") {
            plugin.insert("dependents", Value::Array(Vec::new()));
        }
        for value in plugin.values_mut() {
            if let Value::Array(items) = value {
                let list = stringify_list(items);
                *value = Value::String(list);
            }
        }

        Ok(plugin)
    }
}

/// Returns whether the host skips a file or directory with this name.
#[must_use]
pub fn is_excluded(name: &OsStr) -> bool {
    name.to_str().is_none_or(|name| EXCLUDE.is_match(name))
}

/// Returns whether the host reads this file as loading instructions rather
/// than as tiddler content.
///
/// `tiddlywiki.files` and `.multids` files are not expanded by this loader.
#[must_use]
pub fn is_directive(path: &Path) -> bool {
    path.file_name() == Some(OsStr::new(FILES_DIRECTIVE))
        || path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("multids"))
}

/// Renders values as a host list: items with spaces are wrapped in `[[...]]`.
#[must_use]
pub fn stringify_list(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| {
            let item = match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if item.is_empty() || item.chars().any(char::is_whitespace) {
                format!("[[{item}]]")
            } else {
                item
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn load_tiddlers(folder: &Path, plugin_title: &str) -> PluginResult<Map<String, Value>> {
    let mut tiddlers = Map::new();
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| PluginError::Io(e.into()))?;
        if !entry.file_type().is_file() || entry.file_name() == PLUGIN_INFO {
            continue;
        }
        if is_directive(entry.path()) {
            warn!(file = %entry.path().display(), "loading directives are not supported, skipping");
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(|e| PluginError::load_failed(entry.path(), e.to_string()))?
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        for fields in load_file(entry.path(), format!("{plugin_title}/{relative}"))? {
            let Some(title) = fields.get("title").and_then(Value::as_str) else {
                continue;
            };
            trace!(%title, file = %relative, "loaded shadow tiddler");
            tiddlers.insert(title.to_string(), Value::Object(fields));
        }
    }

    Ok(tiddlers)
}

fn load_file(path: &Path, default_title: String) -> PluginResult<Vec<Map<String, Value>>> {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_ascii_lowercase();
    let bytes = fs::read(path)?;

    if extension == "tid" {
        let mut fields = parse_tid(&utf8(path, bytes)?);
        fields
            .entry("title")
            .or_insert(Value::String(default_title));
        return Ok(vec![fields]);
    }

    let mut fields = read_meta(path)?;
    if extension == "json"
        && fields.is_empty()
        && let Some(tiddlers) = tiddler_array(&bytes)
    {
        return Ok(tiddlers);
    }

    let content_type = fields
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| content_type(&extension))
        .map(str::to_string);
    let text = match content_type.as_deref() {
        Some(ty) if is_binary(ty) => STANDARD.encode(&bytes),
        _ => utf8(path, bytes)?,
    };

    fields.insert("text".to_string(), Value::String(text));
    if let Some(ty) = content_type {
        fields.entry("type").or_insert(Value::String(ty));
    }
    fields
        .entry("title")
        .or_insert(Value::String(default_title));
    Ok(vec![fields])
}

fn utf8(path: &Path, bytes: Vec<u8>) -> PluginResult<String> {
    String::from_utf8(bytes).map_err(|_| PluginError::load_failed(path, "not valid UTF-8"))
}

/// Reads the `<file>.meta` sidecar, if any.
fn read_meta(path: &Path) -> PluginResult<Map<String, Value>> {
    let mut meta = path.as_os_str().to_owned();
    meta.push(".meta");
    let meta = PathBuf::from(meta);
    if !meta.is_file() {
        return Ok(Map::new());
    }
    Ok(parse_fields(&fs::read_to_string(&meta)?))
}

/// Parses `name: value` lines. Lines without a colon are ignored.
fn parse_fields(header: &str) -> Map<String, Value> {
    header
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), Value::String(value.trim().to_string())))
        })
        .collect()
}

/// Parses a `.tid` file: header fields, a blank line, then the text.
fn parse_tid(content: &str) -> Map<String, Value> {
    let content = content.replace("\r\n", "\n");
    let (header, text) = content
        .split_once("\n\n")
        .unwrap_or((content.as_str(), ""));
    let mut fields = parse_fields(header);
    fields.insert("text".to_string(), Value::String(text.to_string()));
    fields
}

/// Returns the tiddlers of a JSON file holding an array of titled objects.
fn tiddler_array(bytes: &[u8]) -> Option<Vec<Map<String, Value>>> {
    let Value::Array(items) = serde_json::from_slice(bytes).ok()? else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(fields) if fields.get("title").is_some_and(Value::is_string) => {
                Some(fields)
            }
            _ => None,
        })
        .collect()
}

fn content_type(extension: &str) -> Option<&'static str> {
    let ty = match extension {
        "js" => "application/javascript",
        "json" => "application/json",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "md" => "text/x-markdown",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(ty)
}

/// Types the host stores base64 encoded.
fn is_binary(content_type: &str) -> bool {
    (content_type.starts_with("image/") && content_type != "image/svg+xml")
        || content_type.starts_with("font/")
        || content_type == "application/pdf"
}
