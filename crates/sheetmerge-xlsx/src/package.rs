//! The OPC container: a ZIP archive of named parts.

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Per-part inflation limit. Worksheets of real models stay far below this.
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB
/// Limit on the sum of all inflated parts, guarding against zip bombs.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

pub const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub const MACRO_WORKBOOK_CONTENT_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";
pub const VBA_PROJECT_CONTENT_TYPE: &str = "application/vnd.ms-office.vbaProject";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("part {part} inflates beyond {max} bytes")]
    PartTooLarge { part: String, max: u64 },
    #[error("package inflates beyond {max} bytes")]
    PackageTooLarge { max: u64 },
}

/// Which spreadsheet package flavour a workbook part is stored as.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorkbookKind {
    /// `.xlsx`: no macro payload allowed.
    #[default]
    Workbook,
    /// `.xlsm`: may carry `xl/vbaProject.bin`.
    MacroEnabledWorkbook,
}

impl WorkbookKind {
    pub fn workbook_content_type(self) -> &'static str {
        match self {
            WorkbookKind::Workbook => WORKBOOK_CONTENT_TYPE,
            WorkbookKind::MacroEnabledWorkbook => MACRO_WORKBOOK_CONTENT_TYPE,
        }
    }

    /// Recognizes the main-part content types of both the workbook and template
    /// flavours of each variant.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim() {
            WORKBOOK_CONTENT_TYPE
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml" => {
                Some(WorkbookKind::Workbook)
            }
            MACRO_WORKBOOK_CONTENT_TYPE | "application/vnd.ms-excel.template.macroEnabled.main+xml" => {
                Some(WorkbookKind::MacroEnabledWorkbook)
            }
            _ => None,
        }
    }

    pub fn supports_macros(self) -> bool {
        matches!(self, WorkbookKind::MacroEnabledWorkbook)
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            WorkbookKind::Workbook => "xlsx",
            WorkbookKind::MacroEnabledWorkbook => "xlsm",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// All parts of a package, inflated into memory and keyed by their stored name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        Self::from_reader(std::io::Cursor::new(bytes), PackageLimits::default())
    }

    pub fn from_reader<R: Read + Seek>(
        reader: R,
        limits: PackageLimits,
    ) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = BTreeMap::new();
        let mut total: u64 = 0;

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            // The declared size can lie; bound the actual read instead.
            let mut buf = Vec::new();
            file.take(limits.max_part_bytes + 1).read_to_end(&mut buf)?;
            let len = buf.len() as u64;
            if len > limits.max_part_bytes {
                return Err(PackageError::PartTooLarge {
                    part: name,
                    max: limits.max_part_bytes,
                });
            }
            total = total.saturating_add(len);
            if total > limits.max_total_bytes {
                return Err(PackageError::PackageTooLarge {
                    max: limits.max_total_bytes,
                });
            }
            parts.insert(name, buf);
        }

        Ok(Self { parts })
    }

    /// Look up a part by name, accepting the spelling variants producers emit
    /// (leading `/`, backslashes, ASCII case, percent-encoding).
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        if let Some(bytes) = self.parts.get(name) {
            return Some(bytes);
        }
        let wanted = part_name_key(name);
        self.parts
            .iter()
            .find(|(stored, _)| part_name_key(stored) == wanted)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    /// Write the package as a ZIP archive. `first` lists parts emitted ahead of the
    /// rest (in that order); everything else follows in name order.
    pub fn write_to<W: Write + Seek>(&self, writer: W, first: &[&str]) -> Result<W, PackageError> {
        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

        let leading = first.iter().filter(|name| self.parts.contains_key(**name));
        let rest = self
            .parts
            .keys()
            .map(String::as_str)
            .filter(|name| !first.contains(name));
        for name in leading.copied().chain(rest) {
            zip.start_file(name, options)?;
            zip.write_all(&self.parts[name])?;
        }
        Ok(zip.finish()?)
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Canonical comparison key for a part name.
fn part_name_key(name: &str) -> Vec<u8> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let mut b = bytes[i];
        if b == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                b = (hi << 4) | lo;
                i += 2;
            }
        }
        if b == b'\\' {
            b = b'/';
        }
        if !(out.is_empty() && b == b'/') {
            out.push(b.to_ascii_lowercase());
        }
        i += 1;
    }
    out
}

/// Relationship part for `part`: `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`.
pub fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship `Target` against the part that owns the relationship.
///
/// Absolute targets (`/xl/styles.xml`) are package-rooted; relative ones are joined to
/// the source part's directory. Fragments are dropped and `.`/`..` segments collapsed.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or_default().replace('\\', "/");
    let joined = match target.strip_prefix('/') {
        Some(rooted) => rooted.to_string(),
        None => match source_part.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{target}"),
            None => target,
        },
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Inverse of [`resolve_target`] for parts written next to each other: the target a
/// part in `source_dir` uses to reach `part`.
pub(crate) fn relative_target(source_dir: &str, part: &str) -> String {
    let prefix = format!("{source_dir}/");
    match part.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => format!("/{part}"),
    }
}
