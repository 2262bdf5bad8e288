//! Reading and writing YAML files while keeping their indentation style.
//!
//! The files we patch (role requirements, release deliverables) are reviewed
//! as diffs, so a rewrite must indent the way the file already does. serde_yaml
//! parses them; writing goes through a small block-style emitter that takes a
//! [`YamlStyle`] guessed from the original text.

use erreur::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::{fs, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YamlStyle {
    /// Column offset of nested content relative to its parent key
    pub indent: usize,
    /// Column offset of a sequence's dashes relative to its parent key
    pub sequence_offset: usize,
    /// Start the document with `---`
    pub explicit_start: bool,
}

impl Default for YamlStyle {
    fn default() -> Self {
        YamlStyle {
            indent: 2,
            sequence_offset: 0,
            explicit_start: false,
        }
    }
}

impl YamlStyle {
    /// Infer the style from existing YAML text.
    ///
    /// The first block sequence decides both values. Without any sequence, the
    /// first nested mapping decides `indent`. Anything undecidable keeps the
    /// default.
    pub fn guess(text: &str) -> Self {
        let mut style = YamlStyle::default();
        let mut mapping_indent = None;
        // column of the previous content line, and whether it opened a block
        let mut previous: Option<(usize, bool)> = None;

        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with("---") {
                style.explicit_start = true;
                continue;
            }
            let column = line.len() - trimmed.len();

            if let Some(rest) = dash_item(trimmed) {
                let content = column + 1 + (rest.len() - rest.trim_start().len()).max(1);
                let parent = match previous {
                    None => Some(0),
                    Some((parent, true)) if parent <= column => Some(parent),
                    _ => None,
                };
                if let Some(parent) = parent {
                    style.sequence_offset = column - parent;
                    style.indent = content - parent;
                    return style.normalized();
                }
                previous = Some((content, opens_block(rest)));
                continue;
            }

            if let Some((parent, true)) = previous {
                if column > parent && mapping_indent.is_none() {
                    mapping_indent = Some(column - parent);
                }
            }
            previous = Some((column, opens_block(trimmed)));
        }

        if let Some(indent) = mapping_indent {
            style.indent = indent;
        }
        style.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.indent < self.sequence_offset + 2 {
            self.indent = self.sequence_offset + 2;
        }
        self
    }
}

fn dash_item(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('-')?;
    if rest.is_empty() || rest.starts_with(' ') {
        Some(rest)
    } else {
        None
    }
}

fn opens_block(content: &str) -> bool {
    content.trim_end().ends_with(':')
}

/// Read a YAML file, returning its data and the style it was written in.
pub fn load(path: impl AsRef<Path>) -> Result<(Value, YamlStyle)> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("read `{}`", path.display()))?;
    let value: Value =
        serde_yaml::from_str(&text).with_context(|| format!("parse `{}`", path.display()))?;
    Ok((value, YamlStyle::guess(&text)))
}

/// Like [`load`] but deserializes into `T`.
pub fn load_as<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(T, YamlStyle)> {
    let path = path.as_ref();
    let (value, style) = load(path)?;
    let data = serde_yaml::from_value(value)
        .with_context(|| format!("unexpected content in `{}`", path.display()))?;
    Ok((data, style))
}

/// A scalar as it reads in the file: `1.3`, `true`, `master`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// For fields that are strings but may be written unquoted (`version: 1.3`).
pub fn deserialize_scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_string(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a scalar, found {:?}", value)))
}

/// Write `data` to `path` in `style`.
///
/// Comments of the file being replaced are not carried over, so a patched
/// deliverable or requirements file loses them.
pub fn dump(path: impl AsRef<Path>, data: &impl Serialize, style: YamlStyle) -> Result<()> {
    let path = path.as_ref();
    let text = to_string(data, style).with_context(|| format!("serialize `{}`", path.display()))?;
    fs::write(path, text).with_context(|| format!("write `{}`", path.display()))?;
    log::debug!("wrote `{}`", path.display());
    Ok(())
}

pub fn to_string(data: &impl Serialize, style: YamlStyle) -> Result<String> {
    let value = serde_yaml::to_value(data).context("convert to YAML")?;
    let mut out = String::new();
    if style.explicit_start {
        out.push_str("---\n");
    }

    match &value {
        Value::Mapping(map) if !map.is_empty() => emit_mapping(&mut out, map, 0, false, style)?,
        Value::Sequence(seq) if !seq.is_empty() => emit_sequence(&mut out, seq, 0, style)?,
        other => {
            out.push_str(&scalar(other)?);
            out.push('\n');
        }
    }

    Ok(out)
}

fn emit_mapping(
    out: &mut String,
    map: &Mapping,
    column: usize,
    continues_dash: bool,
    style: YamlStyle,
) -> Result<()> {
    for (idx, (key, value)) in map.iter().enumerate() {
        if idx > 0 || !continues_dash {
            pad(out, column);
        }
        out.push_str(&scalar(key)?);
        out.push(':');

        match value {
            Value::Mapping(inner) if !inner.is_empty() => {
                out.push('\n');
                emit_mapping(out, inner, column + style.indent, false, style)?;
            }
            Value::Sequence(inner) if !inner.is_empty() => {
                out.push('\n');
                emit_sequence(out, inner, column, style)?;
            }
            Value::Null => out.push('\n'),
            other => {
                out.push(' ');
                out.push_str(&scalar(other)?);
                out.push('\n');
            }
        }
    }
    Ok(())
}

fn emit_sequence(out: &mut String, seq: &[Value], parent: usize, style: YamlStyle) -> Result<()> {
    let dash = parent + style.sequence_offset;
    let content = parent + style.indent;

    for item in seq {
        pad(out, dash);
        out.push('-');

        match item {
            Value::Mapping(inner) if !inner.is_empty() => {
                pad(out, content - dash - 1);
                emit_mapping(out, inner, content, true, style)?;
            }
            Value::Sequence(inner) if !inner.is_empty() => {
                out.push('\n');
                emit_sequence(out, inner, content, style)?;
            }
            Value::Null => out.push('\n'),
            other => {
                pad(out, content - dash - 1);
                out.push_str(&scalar(other)?);
                out.push('\n');
            }
        }
    }
    Ok(())
}

fn pad(out: &mut String, width: usize) {
    out.extend(std::iter::repeat(' ').take(width));
}

fn scalar(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Mapping(map) if map.is_empty() => "{}".to_string(),
        Value::Sequence(seq) if seq.is_empty() => "[]".to_string(),
        // JSON strings are valid double-quoted YAML scalars
        Value::String(s) if s.contains('\n') => serde_json::to_string(s)?,
        other => serde_yaml::to_string(other)?.trim_end().to_string(),
    })
}
