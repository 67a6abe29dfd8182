//! Finding the embedded JSON payload inside raw page script text.
//!
//! Each site leaves a marker token in the script that carries the scene. The
//! first script containing the marker is the only one considered.

use crate::variant::SiteVariant;

/// Script block holding the realsee.com module data.
pub const WORK_MARKER: &str = "work_code";
/// Statement separator inside the realsee.com module script.
pub const STATEMENT_SEPARATOR: &str = ";;";
/// Statement that assigns the scene object.
pub const MODULE_DATA_MARKER: &str = "__module__data";
pub const HOUSE_INFO_MARKER: &str = "houseInfo";
pub const RESOURCE_CODE_MARKER: &str = "resource_code";
/// The comment wrappers arrive entity-escaped because the script text itself is escaped.
pub const COMMENT_OPEN: &str = "&lt;!--";
pub const COMMENT_CLOSE: &str = "--&gt;";

/// Isolate the payload for `variant`, or `None` when the page does not carry one.
pub fn locate(lines: &[String], variant: SiteVariant) -> Option<&str> {
    match variant {
        SiteVariant::Realsee => {
            let line = first_line_with(lines, WORK_MARKER)?;
            let statement = line
                .trim()
                .split(STATEMENT_SEPARATOR)
                .find(|part| part.contains(MODULE_DATA_MARKER))?;
            isolate_object(statement)
        }
        SiteVariant::OpenRealsee => between_comment(first_line_with(lines, HOUSE_INFO_MARKER)?),
        SiteVariant::RealseeCn => between_comment(first_line_with(lines, RESOURCE_CODE_MARKER)?),
    }
}

fn first_line_with<'a>(lines: &'a [String], marker: &str) -> Option<&'a str> {
    lines.iter().find(|line| line.contains(marker)).map(String::as_str)
}

/// Text strictly between the escaped comment open and close tokens.
pub fn between_comment(line: &str) -> Option<&str> {
    let start = line.find(COMMENT_OPEN)? + COMMENT_OPEN.len();
    let end = start + line[start..].find(COMMENT_CLOSE)?;
    Some(line[start..end].trim())
}

/// The first balanced `{...}` object in `text`.
///
/// The module statement puts one sign or quote byte and the assignment before
/// the object, and may trail it with a `;` or a call's closing paren. Scanning
/// from the first `{` to its matching `}` drops both. Braces inside JSON
/// strings (including escaped quotes) are not counted.
pub fn isolate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
