//! Dot-separated target paths into the state document
//!
//! A path like `nations.usa.economicIndicators.gdp` or
//! `conflicts.activeWars.0.casualties.military` addresses one slot in the
//! dynamic rendition of the document. Segments are either identifiers
//! (object keys) or non-negative integers (list indices). Grammar errors are
//! distinct from resolution errors: the former mean the path text itself is
//! malformed, the latter that a well-formed path does not exist in this
//! document.

use serde_json::Value;
use thiserror::Error;

/// One step of a target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Grammar errors for path text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path contains an empty segment")]
    EmptySegment,
    #[error("invalid segment '{0}': expected an identifier or a list index")]
    InvalidSegment(String),
}

/// A parsed, validated target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    raw: String,
    segments: Vec<PathSegment>,
}

fn parse_segment(text: &str) -> Result<PathSegment, PathError> {
    if text.is_empty() {
        return Err(PathError::EmptySegment);
    }
    let mut chars = text.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(PathError::EmptySegment),
    };
    if first.is_ascii_digit() {
        return text
            .parse::<usize>()
            .map(PathSegment::Index)
            .map_err(|_| PathError::InvalidSegment(text.to_string()));
    }
    if first != '_' && !first.is_ascii_alphabetic() {
        return Err(PathError::InvalidSegment(text.to_string()));
    }
    if chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
        Ok(PathSegment::Key(text.to_string()))
    } else {
        Err(PathError::InvalidSegment(text.to_string()))
    }
}

impl TargetPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = trimmed
            .split('.')
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Last segment. Parsing guarantees at least one.
    pub fn last(&self) -> &PathSegment {
        match self.segments.last() {
            Some(seg) => seg,
            None => unreachable!("parsed path always has at least one segment"),
        }
    }

    /// First segment. Parsing guarantees at least one.
    pub fn head(&self) -> &PathSegment {
        match self.segments.first() {
            Some(seg) => seg,
            None => unreachable!("parsed path always has at least one segment"),
        }
    }

    /// Resolve the slot this path addresses, read-only.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(k) => current.as_object()?.get(k)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
            };
        }
        Some(current)
    }

    /// Resolve the slot this path addresses, mutably.
    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(k) => current.as_object_mut()?.get_mut(k)?,
                PathSegment::Index(i) => current.as_array_mut()?.get_mut(*i)?,
            };
        }
        Some(current)
    }

    /// Resolve the container holding the last segment, mutably.
    pub fn resolve_parent_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &self.segments[..self.segments.len() - 1] {
            current = match segment {
                PathSegment::Key(k) => current.as_object_mut()?.get_mut(k)?,
                PathSegment::Index(i) => current.as_array_mut()?.get_mut(*i)?,
            };
        }
        Some(current)
    }

    /// Write `new_value` at this path.
    ///
    /// Missing intermediate objects are created when the following segment is
    /// a key. Missing lists are never fabricated: a path that indexes into a
    /// container that does not exist, or indexes past a list's length, is an
    /// error. As the one exception, the final segment may index exactly one
    /// past the end of an existing list, which appends.
    pub fn set(&self, root: &mut Value, new_value: Value) -> Result<(), String> {
        let mut current = root;
        let body_len = self.segments.len() - 1;
        for (pos, segment) in self.segments[..body_len].iter().enumerate() {
            match segment {
                PathSegment::Key(k) => {
                    let object = current.as_object_mut().ok_or_else(|| {
                        format!("segment '{}' of '{}' is not an object", k, self.raw)
                    })?;
                    if !object.contains_key(k) {
                        match &self.segments[pos + 1] {
                            PathSegment::Key(_) => {
                                object.insert(k.clone(), Value::Object(Default::default()));
                            }
                            PathSegment::Index(_) => {
                                return Err(format!(
                                    "cannot create missing list at '{}' in '{}'",
                                    k, self.raw
                                ));
                            }
                        }
                    }
                    current = match object.get_mut(k) {
                        Some(v) => v,
                        None => return Err(format!("segment '{}' vanished during set", k)),
                    };
                }
                PathSegment::Index(i) => {
                    let list = current.as_array_mut().ok_or_else(|| {
                        format!("segment '{}' of '{}' is not a list", i, self.raw)
                    })?;
                    let len = list.len();
                    current = list.get_mut(*i).ok_or_else(|| {
                        format!("index {} out of bounds (len {}) in '{}'", i, len, self.raw)
                    })?;
                }
            }
        }
        match self.last() {
            PathSegment::Key(k) => {
                let object = current.as_object_mut().ok_or_else(|| {
                    format!("parent of '{}' in '{}' is not an object", k, self.raw)
                })?;
                object.insert(k.clone(), new_value);
                Ok(())
            }
            PathSegment::Index(i) => {
                let list = current.as_array_mut().ok_or_else(|| {
                    format!("parent of index {} in '{}' is not a list", i, self.raw)
                })?;
                if *i < list.len() {
                    list[*i] = new_value;
                    Ok(())
                } else if *i == list.len() {
                    list.push(new_value);
                    Ok(())
                } else {
                    Err(format!(
                        "index {} out of bounds (len {}) in '{}'",
                        i,
                        list.len(),
                        self.raw
                    ))
                }
            }
        }
    }
}

impl std::fmt::Display for TargetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
