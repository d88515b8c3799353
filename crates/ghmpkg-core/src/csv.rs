//! Reading and writing catalog CSV files.

use std::path::{Path, PathBuf};

use ghmpkg_utils::fs::{list_files, read_file_string, write_file};
use tracing::debug;

use crate::{catalog::PackageRecord, error::MigrateError, MigrateResult};

pub const CATALOG_HEADER: [&str; 6] = [
    "organization",
    "repository",
    "package_type",
    "package_name",
    "package_version",
    "package_filename",
];

const CATALOG_SUFFIX: &str = "_packages.csv";

/// File name of an exported catalog, e.g. `2024-05-01_10-00-00_acme_npm_packages.csv`.
pub fn catalog_file_name(timestamp: &str, organization: &str, package_type: &str) -> String {
    format!("{timestamp}_{organization}_{package_type}{CATALOG_SUFFIX}")
}

/// Most recent catalog in `dir`.
///
/// Catalog names start with a sortable timestamp, so the lexicographically greatest
/// match is the newest. Returns `None` when the directory is missing or has no catalog.
pub fn latest_catalog_file<P: AsRef<Path>>(dir: P) -> MigrateResult<Option<PathBuf>> {
    let pattern = format!("*{CATALOG_SUFFIX}");
    let latest = list_files(dir)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|name| fast_glob::glob_match(&pattern, name.to_string_lossy().as_ref()))
                .unwrap_or(false)
        })
        .max();
    Ok(latest)
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// A parsed CSV row with the line it starts on.
struct Row {
    line: usize,
    fields: Vec<String>,
}

impl Row {
    fn is_blank(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].trim().is_empty()
    }
}

/// Splits CSV content into rows. Quoted fields may contain separators, doubled quotes and
/// line breaks. Returns the starting line of an unterminated quoted field as the error.
fn split_rows(content: &str) -> Result<Vec<Row>, usize> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_start = 1;
    let mut quote_start = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) => {
                in_quotes = true;
                quote_start = line;
            }
            (',', false) => fields.push(std::mem::take(&mut current)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                fields.push(std::mem::take(&mut current));
                rows.push(Row {
                    line: row_start,
                    fields: std::mem::take(&mut fields),
                });
                row_start = line;
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(quote_start);
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        rows.push(Row {
            line: row_start,
            fields,
        });
    }
    Ok(rows)
}

/// Renders catalog rows, header first.
pub fn to_csv_string(records: &[PackageRecord]) -> String {
    let mut out = CATALOG_HEADER.join(",");
    out.push('\n');
    for r in records {
        let fields = [
            r.organization.as_str(),
            r.repository.as_str(),
            r.package_type.as_str(),
            r.package_name.as_str(),
            r.package_version.as_str(),
            r.filename.as_str(),
        ];
        let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Parses catalog CSV content. `source` names the input in error messages.
pub fn parse_csv(content: &str, source: &str) -> MigrateResult<Vec<PackageRecord>> {
    let invalid = |reason: String| {
        MigrateError::InvalidCatalog {
            path: source.to_string(),
            reason,
        }
    };

    let rows = split_rows(content)
        .map_err(|line| invalid(format!("unterminated quoted field starting on line {line}")))?;
    let mut rows = rows.into_iter().filter(|row| !row.is_blank());

    let header = rows.next().ok_or_else(|| invalid("missing header".into()))?;
    if header.fields != CATALOG_HEADER {
        return Err(invalid(format!(
            "unexpected header `{}`",
            header.fields.join(",")
        )));
    }

    let mut records = Vec::new();
    for Row {
        line,
        fields,
    } in rows
    {
        let fields: [String; 6] = fields.try_into().map_err(|f: Vec<String>| {
            invalid(format!(
                "line {line} has {} fields, expected {}",
                f.len(),
                CATALOG_HEADER.len()
            ))
        })?;
        let [organization, repository, package_type, package_name, package_version, filename] =
            fields;
        let package_type = package_type.parse().map_err(|_| {
            invalid(format!("line {line}: unknown package type `{package_type}`"))
        })?;
        records.push(PackageRecord {
            organization,
            repository,
            package_type,
            package_name,
            package_version,
            filename,
        });
    }
    Ok(records)
}

pub fn read_catalog<P: AsRef<Path>>(path: P) -> MigrateResult<Vec<PackageRecord>> {
    let path = path.as_ref();
    let content = read_file_string(path)?;
    let records = parse_csv(&content, &path.display().to_string())?;
    debug!(path = %path.display(), rows = records.len(), "read catalog");
    Ok(records)
}

pub fn write_catalog<P: AsRef<Path>>(path: P, records: &[PackageRecord]) -> MigrateResult<()> {
    let path = path.as_ref();
    write_file(path, to_csv_string(records))?;
    debug!(path = %path.display(), rows = records.len(), "wrote catalog");
    Ok(())
}
