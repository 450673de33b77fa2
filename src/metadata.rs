use crate::error::Result;
use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub const BEGIN_MARKER: &str = "dx-meta-begin";
pub const END_MARKER: &str = "dx-meta-end";

const SOURCE_LOCATION: &str = "source-location";
const SOURCE_REVISION: &str = "source-revision";

// The start marker has to show up near the top of the file.
const HEADER_SCAN_LINES: usize = 64;

static BEGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<indent>[ \t]*)(?P<lead>.*?)[ \t]*dx-meta-begin[ \t]*$").unwrap());
static END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]*(?:.*?[ \t]*)?dx-meta-end[ \t]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_location: String,
    pub revision_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub name: String,
    pub description: String,
    pub provenance: Option<Provenance>,
    /// Executables that must be on PATH before the command may run.
    pub requires: Vec<String>,
}

/// Location of a header block inside a file's lines.
struct HeaderSpan<'a> {
    begin: usize,
    end: usize,
    indent: &'a str,
    lead: &'a str,
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

fn find_header<'a>(lines: &[&'a str]) -> Option<HeaderSpan<'a>> {
    let (begin, caps) = lines
        .iter()
        .take(HEADER_SCAN_LINES)
        .enumerate()
        .find_map(|(i, l)| BEGIN_RE.captures(strip_eol(*l)).map(|c| (i, c)))?;
    let indent = caps.name("indent").map_or("", |m| m.as_str());
    let lead = caps.name("lead").map_or("", |m| m.as_str());
    let end = lines[begin + 1..]
        .iter()
        .position(|l| END_RE.is_match(strip_eol(l)))
        .map(|p| begin + 1 + p)?;
    Some(HeaderSpan {
        begin,
        end,
        indent,
        lead,
    })
}

/// Splits a header body line into `(field, value)`, dropping the comment leader.
fn field_of<'a>(line: &'a str, lead: &str) -> Option<(&'a str, &'a str)> {
    let mut body = strip_eol(line).trim_start();
    if !lead.is_empty() {
        body = body.strip_prefix(lead).unwrap_or(body);
    }
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match body.split_once(char::is_whitespace) {
        Some((field, value)) => Some((field, value.trim())),
        None => Some((body, "")),
    }
}

/// Parses the header block out of a command file's text. Never evaluates the file.
pub fn parse_header(text: &str) -> Option<CommandRecord> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let span = find_header(&lines)?;
    let mut name = None;
    let mut description = String::new();
    let mut location = None;
    let mut revision = None;
    let mut requires = Vec::new();
    for line in &lines[span.begin + 1..span.end] {
        let Some((field, value)) = field_of(line, span.lead) else { continue };
        match field {
            "name" if !value.is_empty() => name = Some(value.to_string()),
            "description" => description = value.to_string(),
            SOURCE_LOCATION => location = Some(value.to_string()),
            SOURCE_REVISION => revision = Some(value.to_string()),
            "requires" => requires.extend(value.split_whitespace().map(str::to_string)),
            _ => {}
        }
    }
    let provenance = match (location, revision) {
        (Some(source_location), revision) => Some(Provenance {
            source_location,
            revision_id: revision.unwrap_or_default(),
        }),
        (None, Some(revision_id)) => Some(Provenance {
            source_location: String::new(),
            revision_id,
        }),
        (None, None) => None,
    };
    Some(CommandRecord {
        name: name?,
        description,
        provenance,
        requires,
    })
}

/// Reads `path` and extracts its command record, `None` when the file is not a command.
pub fn extract(path: &Path) -> Result<Option<CommandRecord>> {
    let bytes = fs::read(path)?;
    let Ok(text) = String::from_utf8(bytes) else {
        tracing::debug!(path = %path.display(), "skipping non-utf8 file");
        return Ok(None);
    };
    Ok(parse_header(&text))
}

fn comment_lead_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "js" | "mjs" | "ts" | "go" | "rs" | "c" | "cpp" | "java" | "kt" | "swift" => "//",
        _ => "#",
    }
}

/// Stamps provenance into a header, replacing any earlier provenance lines.
///
/// When the text has no header one is synthesized right after the shebang (if any), named
/// after `file_name`'s stem. Applying the same provenance twice yields identical text.
pub fn inject_provenance(text: &str, file_name: &str, provenance: &Provenance) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut out = String::with_capacity(text.len() + 128);

    if let Some(span) = find_header(&lines) {
        let prefix = if span.lead.is_empty() {
            span.indent.to_string()
        } else {
            format!("{}{} ", span.indent, span.lead)
        };
        for (i, line) in lines.iter().enumerate() {
            if i > span.begin && i < span.end {
                if let Some((field, _)) = field_of(line, span.lead) {
                    if field == SOURCE_LOCATION || field == SOURCE_REVISION {
                        continue;
                    }
                }
            }
            if i == span.end {
                push_field(&mut out, &prefix, SOURCE_LOCATION, &provenance.source_location, eol);
                push_field(&mut out, &prefix, SOURCE_REVISION, &provenance.revision_id, eol);
            }
            out.push_str(line);
        }
        return out;
    }

    let insert_at = match lines.first() {
        Some(first) if first.starts_with("#!") => 1,
        _ => 0,
    };
    let lead = comment_lead_for(file_name);
    let prefix = format!("{lead} ");
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    for line in &lines[..insert_at] {
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push_str(eol);
        }
    }
    out.push_str(&format!("{lead} {BEGIN_MARKER}{eol}"));
    push_field(&mut out, &prefix, "name", stem, eol);
    push_field(&mut out, &prefix, "description", "", eol);
    push_field(&mut out, &prefix, SOURCE_LOCATION, &provenance.source_location, eol);
    push_field(&mut out, &prefix, SOURCE_REVISION, &provenance.revision_id, eol);
    out.push_str(&format!("{lead} {END_MARKER}{eol}"));
    for line in &lines[insert_at..] {
        out.push_str(line);
    }
    out
}

fn push_field(out: &mut String, prefix: &str, field: &str, value: &str, eol: &str) {
    out.push_str(prefix);
    out.push_str(field);
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push_str(eol);
}

/// File-level [`inject_provenance`]; only writes when the content actually changes.
pub fn inject_file(path: &Path, provenance: &Provenance) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let updated = inject_provenance(&text, &file_name, provenance);
    if updated != text {
        fs::write(path, updated)?;
    }
    Ok(())
}
