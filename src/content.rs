use std::fs;
use std::path::Path;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use regex::Captures;

use crate::error::{Error, Result};
use crate::file_match::ContentMatch;
use crate::filesystem;
use crate::filter::pattern::{Filter, NamePart};

/// A file decoded into text, remembering how to write it back.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub had_bom: bool,
}

/// Read a file and decode it: a BOM decides the encoding if present,
/// otherwise `default` applies. Bytes that do not form valid text in the
/// chosen encoding are an `Encoding` error, reported per path.
pub fn decode_file(path: &Path, default: &'static Encoding) -> Result<DecodedText> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;

    let had_bom = Encoding::for_bom(&bytes).is_some();
    let (text, encoding, had_errors) = default.decode(&bytes);
    if had_errors {
        return Err(Error::Encoding {
            path: path.to_path_buf(),
            encoding: encoding.name(),
        });
    }

    Ok(DecodedText {
        text: text.into_owned(),
        encoding,
        had_bom,
    })
}

/// Encode text for writing back, restoring the BOM when the original file
/// carried one. UTF-16 is encoded by hand; `encoding_rs` has no UTF-16
/// encoder.
pub fn encode_text(text: &str, encoding: &'static Encoding, with_bom: bool) -> Vec<u8> {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        let le = encoding == UTF_16LE;
        let mut bytes = Vec::with_capacity(text.len() * 2 + 2);
        if with_bom {
            bytes.extend_from_slice(if le { &[0xFF, 0xFE] } else { &[0xFE, 0xFF] });
        }
        for unit in text.encode_utf16() {
            let pair = if le {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            };
            bytes.extend_from_slice(&pair);
        }
        return bytes;
    }

    let (encoded, _, _) = encoding.encode(text);
    if with_bom && encoding == UTF_8 {
        let mut bytes = Vec::with_capacity(encoded.len() + 3);
        bytes.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
        bytes.extend_from_slice(&encoded);
        bytes
    } else {
        encoded.into_owned()
    }
}

/// Evaluate a content filter against decoded text, producing the record
/// carried on a `FileMatch`.
pub fn evaluate_content(filter: &Filter, decoded: &DecodedText) -> Option<ContentMatch> {
    if filter.is_negative() {
        return filter.evaluate(&decoded.text).map(|primary| ContentMatch {
            text: decoded.text.clone(),
            encoding: decoded.encoding,
            had_bom: decoded.had_bom,
            primary,
        });
    }
    filter
        .primary_match(&decoded.text)
        .map(|primary| ContentMatch {
            text: decoded.text.clone(),
            encoding: decoded.encoding,
            had_bom: decoded.had_bom,
            primary,
        })
}

/// What to substitute for each match: a template with `$n` / `${name}`
/// back-references, or a caller-supplied function of the captures.
pub enum Replacement<'a> {
    Template(&'a str),
    Evaluator(&'a dyn Fn(&Captures) -> String),
}

impl<'a> Replacement<'a> {
    fn push(&self, caps: &Captures, out: &mut String) {
        match self {
            Replacement::Template(template) => caps.expand(template, out),
            Replacement::Evaluator(eval) => out.push_str(&eval(caps)),
        }
    }
}

/// Apply the replacement to every match, left to right, non-overlapping.
/// For a group-scoped filter only the group's span is rewritten, and matches
/// where the group did not participate are left untouched.
///
/// Returns the edited buffer and the number of replacements.
pub fn replace_text(filter: &Filter, text: &str, replacement: &Replacement) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;

    for caps in filter.regex().captures_iter(text) {
        let target = match filter.group_index() {
            None => caps.get(0).expect("group 0 always participates"),
            Some(index) => match caps.get(index) {
                Some(group) => group,
                None => continue,
            },
        };
        out.push_str(&text[last..target.start()]);
        replacement.push(&caps, &mut out);
        last = target.end();
        count += 1;
    }

    out.push_str(&text[last..]);
    (out, count)
}

/// Rewrite the configured name part of a file name. `FullName` degrades to
/// the whole name here; a rename never escapes its directory.
pub fn transform_file_name(
    filter: &Filter,
    file_name: &str,
    replacement: &Replacement,
) -> (String, usize) {
    match filter.name_part() {
        NamePart::Name | NamePart::FullName => replace_text(filter, file_name, replacement),
        NamePart::NameWithoutExtension => match file_name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => {
                let (new_stem, count) = replace_text(filter, stem, replacement);
                (format!("{new_stem}.{extension}"), count)
            }
            _ => replace_text(filter, file_name, replacement),
        },
        NamePart::Extension => match file_name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => {
                let (new_extension, count) = replace_text(filter, extension, replacement);
                (format!("{stem}.{new_extension}"), count)
            }
            _ => (file_name.to_owned(), 0),
        },
    }
}

/// Write replaced content back, atomically, in the file's original encoding.
pub fn write_replaced(path: &Path, decoded: &DecodedText, new_text: &str) -> Result<()> {
    let bytes = encode_text(new_text, decoded.encoding, decoded.had_bom);
    filesystem::write_atomic(path, &bytes).map_err(|e| Error::io(path, e))
}
