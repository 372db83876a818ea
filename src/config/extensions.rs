//! Extension classification table
//!
//! Maps a lowercased, dot-prefixed extension to its type tags, search keywords,
//! whether its content may be extracted, and the size limit for extraction.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Classification of a single extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    /// Type tags (text, document, code, image, ...)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Keywords indexed for every file with this extension
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Whether content extraction is enabled
    #[serde(default)]
    pub content_indexing: bool,

    /// Maximum size for content extraction in megabytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_content_size_mb: Option<u64>,
}

/// Extension → metadata lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtensionTable(BTreeMap<String, ExtensionMetadata>);

// Keys from user config may be written as `md` or `.MD`
impl<'de> Deserialize<'de> for ExtensionTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, ExtensionMetadata>::deserialize(deserializer).map(Self::new)
    }
}

/// Normalize an extension to the lowercased `.ext` form
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().to_lowercase();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}

impl ExtensionTable {
    pub fn new(entries: BTreeMap<String, ExtensionMetadata>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(ext, meta)| (normalize_extension(&ext), meta))
                .collect(),
        )
    }

    pub fn get(&self, ext: &str) -> Option<&ExtensionMetadata> {
        self.0.get(&normalize_extension(ext))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Known extensions form the scanner whitelist
    pub fn is_whitelisted(&self, ext: &str) -> bool {
        self.get(ext).is_some()
    }

    pub fn is_content_indexable(&self, ext: &str) -> bool {
        self.get(ext).map(|m| m.content_indexing).unwrap_or(false)
    }

    /// Content size limit in bytes, falling back to `default_mb`
    pub fn content_size_limit_bytes(&self, ext: &str, default_mb: u64) -> u64 {
        let mb = self
            .get(ext)
            .and_then(|m| m.max_content_size_mb)
            .unwrap_or(default_mb);
        mb.saturating_mul(1024 * 1024)
    }

    /// Type tags, `other` for unknown extensions
    pub fn type_tags(&self, ext: &str) -> Vec<String> {
        match self.get(ext) {
            Some(meta) if !meta.tags.is_empty() => meta.tags.clone(),
            _ => vec!["other".to_string()],
        }
    }

    pub fn keywords(&self, ext: &str) -> &[String] {
        self.get(ext).map(|m| m.keywords.as_slice()).unwrap_or(&[])
    }

    /// Every extension carrying at least one of the given tags
    pub fn extensions_for_tags(&self, tags: &HashSet<String>) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, meta)| meta.tags.iter().any(|t| tags.contains(t)))
            .map(|(ext, _)| ext.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtensionMetadata)> {
        self.0.iter()
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        default_extension_table()
    }
}

type Row = (&'static str, &'static [&'static str], &'static [&'static str], Option<u64>);

// (extension, tags, keywords, content limit in MB; None = no content indexing)
const DEFAULT_ROWS: &[Row] = &[
    (".txt", &["text", "document"], &["text", "document", "note"], Some(5)),
    (".md", &["text", "document", "code"], &["markdown", "document", "note"], Some(10)),
    (".rtf", &["document"], &["rich text", "document"], Some(10)),
    (".pdf", &["document"], &["pdf", "document", "ebook"], Some(50)),
    (".doc", &["document"], &["word", "document"], Some(40)),
    (".docx", &["document"], &["word", "document"], Some(40)),
    (".odt", &["document"], &["document", "open office"], Some(40)),
    (".html", &["document", "text"], &["html", "web", "document"], Some(10)),
    (".epub", &["ebook", "document"], &["ebook", "epub", "book"], Some(100)),
    (".mobi", &["ebook", "document"], &["ebook", "mobi", "book"], Some(100)),
    (".ppt", &["presentation"], &["powerpoint", "presentation", "slide"], Some(80)),
    (".pptx", &["presentation"], &["powerpoint", "presentation", "slide"], Some(80)),
    (".key", &["presentation"], &["keynote", "presentation", "slide"], Some(80)),
    (".xls", &["spreadsheet", "data"], &["excel", "spreadsheet", "sheet"], Some(60)),
    (".xlsx", &["spreadsheet", "data"], &["excel", "spreadsheet", "sheet"], Some(60)),
    (".csv", &["spreadsheet", "data"], &["csv", "data"], Some(15)),
    (".json", &["data", "code"], &["json", "data"], Some(10)),
    (".xml", &["data", "code"], &["xml", "data"], Some(10)),
    (".yaml", &["data", "code"], &["yaml", "data"], Some(10)),
    (".yml", &["data", "code"], &["yaml", "data"], Some(10)),
    (".toml", &["data", "code"], &["toml", "config"], Some(2)),
    (".sql", &["data", "code"], &["sql", "database"], Some(10)),
    (".log", &["text"], &["log", "text"], Some(5)),
    (".ini", &["text", "code"], &["config", "settings"], Some(2)),
    (".conf", &["text", "code"], &["config", "settings"], Some(2)),
    (".js", &["code"], &["javascript", "code"], Some(5)),
    (".ts", &["code"], &["typescript", "code"], Some(5)),
    (".tsx", &["code"], &["typescript", "react", "code"], Some(5)),
    (".jsx", &["code"], &["javascript", "react", "code"], Some(5)),
    (".py", &["code"], &["python", "code"], Some(5)),
    (".go", &["code"], &["golang", "code"], Some(5)),
    (".rs", &["code"], &["rust", "code"], Some(5)),
    (".java", &["code"], &["java", "code"], Some(5)),
    (".kt", &["code"], &["kotlin", "code"], Some(5)),
    (".cs", &["code"], &["csharp", "dotnet", "code"], Some(5)),
    (".c", &["code"], &["c", "code"], Some(5)),
    (".cpp", &["code"], &["cpp", "c++", "code"], Some(5)),
    (".swift", &["code"], &["swift", "code"], Some(5)),
    (".php", &["code"], &["php", "code"], Some(5)),
    (".rb", &["code"], &["ruby", "code"], Some(5)),
    (".sh", &["code"], &["shell", "script"], Some(2)),
    (".ps1", &["code"], &["powershell", "script"], Some(2)),
    (".svg", &["image", "design"], &["vector", "svg"], Some(5)),
    (".jpg", &["image"], &["image", "jpeg", "picture", "photo"], None),
    (".jpeg", &["image"], &["image", "jpeg", "picture", "photo"], None),
    (".png", &["image"], &["image", "png", "picture", "photo"], None),
    (".gif", &["image"], &["gif", "animation", "image"], None),
    (".bmp", &["image"], &["image", "bitmap"], None),
    (".tiff", &["image"], &["image", "tiff"], None),
    (".webp", &["image"], &["image", "webp"], None),
    (".heic", &["image"], &["image", "heic"], None),
    (".mp4", &["video"], &["video", "mp4", "movie"], None),
    (".mov", &["video"], &["video", "mov", "movie"], None),
    (".avi", &["video"], &["video", "avi", "movie"], None),
    (".mkv", &["video"], &["video", "mkv", "movie"], None),
    (".webm", &["video"], &["video", "webm", "movie"], None),
    (".mp3", &["audio"], &["audio", "music", "mp3"], None),
    (".wav", &["audio"], &["audio", "sound", "wav"], None),
    (".flac", &["audio"], &["audio", "flac", "music"], None),
    (".m4a", &["audio"], &["audio", "m4a", "music"], None),
    (".ogg", &["audio"], &["audio", "ogg"], None),
    (".zip", &["archive"], &["archive", "compressed", "zip"], None),
    (".rar", &["archive"], &["archive", "compressed", "rar"], None),
    (".7z", &["archive"], &["archive", "compressed", "7z"], None),
    (".tar", &["archive"], &["archive", "compressed", "tar"], None),
    (".gz", &["archive"], &["archive", "compressed", "gz"], None),
    (".exe", &["installer"], &["application", "exe", "installer"], None),
    (".msi", &["installer"], &["application", "msi", "installer"], None),
    (".dmg", &["installer"], &["application", "dmg", "installer"], None),
    (".pkg", &["installer"], &["application", "pkg", "installer"], None),
    (".deb", &["installer"], &["application", "deb", "installer"], None),
    (".rpm", &["installer"], &["application", "rpm", "installer"], None),
    (".psd", &["design", "image"], &["photoshop", "design", "image"], None),
    (".ai", &["design"], &["illustrator", "design"], None),
    (".sketch", &["design"], &["sketch", "design"], None),
];

fn default_extension_table() -> ExtensionTable {
    let entries = DEFAULT_ROWS
        .iter()
        .map(|(ext, tags, keywords, limit)| {
            (
                ext.to_string(),
                ExtensionMetadata {
                    tags: tags.iter().map(|s| s.to_string()).collect(),
                    keywords: keywords.iter().map(|s| s.to_string()).collect(),
                    content_indexing: limit.is_some(),
                    max_content_size_mb: *limit,
                },
            )
        })
        .collect();
    ExtensionTable(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("MD"), ".md");
        assert_eq!(normalize_extension(".Txt"), ".txt");
        assert_eq!(normalize_extension(""), "");
    }

    #[test]
    fn test_default_table_lookups() {
        let table = ExtensionTable::default();
        assert!(table.is_content_indexable(".md"));
        assert!(!table.is_content_indexable(".png"));
        assert!(!table.is_content_indexable(".unknown"));
        assert_eq!(table.content_size_limit_bytes(".md", 25), 10 * 1024 * 1024);
        assert_eq!(table.content_size_limit_bytes(".png", 25), 25 * 1024 * 1024);
        assert_eq!(table.type_tags(".xyz"), vec!["other".to_string()]);
        assert!(table.keywords(".pdf").contains(&"pdf".to_string()));
    }

    #[test]
    fn test_extensions_for_tags() {
        let table = ExtensionTable::default();
        let tags: HashSet<String> = ["audio".to_string()].into_iter().collect();
        let exts = table.extensions_for_tags(&tags);
        assert!(exts.contains(&".mp3".to_string()));
        assert!(!exts.contains(&".md".to_string()));
    }

    #[test]
    fn test_config_keys_are_normalized() {
        let text = "[md]\ncontent_indexing = true\n\n[\".LOG\"]\ntags = [\"text\"]\n";
        let table: ExtensionTable = toml::from_str(text).unwrap();
        assert!(table.is_content_indexable(".md"));
        assert!(table.is_whitelisted(".log"));
        assert!(table.get("md").is_some());
    }

    #[test]
    fn test_table_toml_roundtrip_keeps_dotted_keys() {
        let table = ExtensionTable::default();
        let text = toml::to_string(&table).unwrap();
        let parsed: ExtensionTable = toml::from_str(&text).unwrap();
        assert_eq!(parsed.get(".md"), table.get(".md"));
    }
}
