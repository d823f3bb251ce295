use time::OffsetDateTime;

/// Which naming scheme the original file gets.
///
/// Registration keeps the uploaded basename for traceability; profile update
/// names the original by timestamp alone.
#[derive(Debug, Clone)]
pub enum NamePolicy {
    Create { basename: String },
    Update,
}

/// Filenames for one stored photo set. All three names embed the same
/// timestamp: it is captured once per operation and reused, so the set stays
/// correlated even under fast successive updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoNames {
    pub photo: String,
    pub thumbnail: String,
    pub square: String,
}

impl PhotoNames {
    pub fn derive(policy: &NamePolicy, taken_at: OffsetDateTime, ext: &str) -> Self {
        let ts = taken_at.unix_timestamp();
        let photo = match policy {
            NamePolicy::Create { basename } => format!("{basename}_{ts}.{ext}"),
            NamePolicy::Update => format!("{ts}.{ext}"),
        };
        Self {
            photo,
            thumbnail: format!("{ts}_thumbnail.{ext}"),
            square: format!("{ts}_square.{ext}"),
        }
    }
}

/// Split an uploaded filename into (basename, extension). The extension is
/// lowercased; a missing extension yields `None`. A dotfile-style name like
/// `".jpg"` counts as extension-only, with an empty basename.
pub fn split_filename(filename: &str) -> (String, Option<String>) {
    match filename.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() => {
            (base.to_string(), Some(ext.to_ascii_lowercase()))
        }
        _ => (filename.to_string(), None),
    }
}
