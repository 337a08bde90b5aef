//! JSON-path-like addressing into document `data`.
//!
//! Paths use the dotted wire form: `.` addresses the whole `data` section,
//! `.a.b` nested mapping keys, `.a[0]` a sequence index. Bracketed indexes
//! may be chained (`.a[0][1].b`).
//!
//! The structural operations over [`serde_yaml::Value`] live here as free
//! functions so every stage of the engine shares one definition of
//! extraction, injection, deletion, and deep merge.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors produced by path parsing and value operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    /// The raw path string could not be parsed.
    #[error("invalid path syntax: {raw:?}")]
    Parse {
        /// The offending raw path.
        raw: String,
    },

    /// No value exists at the addressed location.
    #[error("no value at {path}")]
    Missing {
        /// The path that failed to resolve.
        path: String,
    },

    /// A sequence index is out of bounds.
    #[error("index {index} out of bounds at {path}")]
    IndexOutOfBounds {
        /// The path up to and including the failing index.
        path: String,
        /// The index that was requested.
        index: usize,
    },

    /// A path descends into a scalar value.
    #[error("cannot descend into scalar at {path}")]
    Unindexable {
        /// The path of the scalar that blocked descent.
        path: String,
    },
}

/// One step of a [`DataPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// A mapping key.
    Key(String),
    /// A sequence index.
    Index(usize),
}

/// A parsed path into a document's `data` section.
///
/// The empty segment list is the root path `.`, meaning the whole `data`
/// value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataPath {
    segments: Vec<PathSegment>,
}

impl DataPath {
    /// The root path `.`.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true if this path addresses the whole `data` section.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parsed segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl FromStr for DataPath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parse_err = || PathError::Parse {
            raw: raw.to_string(),
        };

        let rest = raw.strip_prefix('.').ok_or_else(parse_err)?;
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for piece in rest.split('.') {
            // Each piece is a key optionally followed by chained indexes,
            // e.g. `a`, `a[0]`, `a[0][1]`, or bare `[0]`.
            let (key, mut brackets) = match piece.find('[') {
                Some(pos) => (&piece[..pos], &piece[pos..]),
                None => (piece, ""),
            };

            if key.is_empty() && brackets.is_empty() {
                return Err(parse_err());
            }
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            while !brackets.is_empty() {
                let inner = brackets.strip_prefix('[').ok_or_else(parse_err)?;
                let close = inner.find(']').ok_or_else(parse_err)?;
                let index: usize = inner[..close].parse().map_err(|_| parse_err())?;
                segments.push(PathSegment::Index(index));
                brackets = &inner[close + 1..];
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for DataPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Extracts the value at `path`, or `None` if any step is missing.
#[must_use]
pub fn extract<'a>(root: &'a Value, path: &DataPath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.as_mapping()?.get(key.as_str())?,
            PathSegment::Index(index) => current.as_sequence()?.get(*index)?,
        };
    }
    Some(current)
}

/// Sets `value` at `path`, creating intermediate mappings for missing keys.
///
/// The root path replaces the whole value. Sequence indexes must address an
/// existing element; mapping keys are vivified as empty mappings on the way
/// down.
///
/// # Errors
///
/// Returns `PathError` if the path descends into a scalar or a sequence
/// index is out of bounds.
pub fn inject(root: &mut Value, path: &DataPath, value: Value) -> Result<(), PathError> {
    if path.is_root() {
        *root = value;
        return Ok(());
    }

    let mut current = root;
    let mut walked = String::new();
    let (last, intermediate) = path.segments().split_last().expect("non-root path");

    for segment in intermediate {
        write_segment(&mut walked, segment);
        current = match segment {
            PathSegment::Key(key) => {
                if !current.is_mapping() {
                    return Err(PathError::Unindexable { path: walked });
                }
                let mapping = current.as_mapping_mut().expect("checked mapping");
                if !mapping.contains_key(key.as_str()) {
                    mapping.insert(Value::String(key.clone()), Value::Mapping(Mapping::new()));
                }
                mapping.get_mut(key.as_str()).expect("just inserted")
            },
            PathSegment::Index(index) => {
                let Some(sequence) = current.as_sequence_mut() else {
                    return Err(PathError::Unindexable { path: walked });
                };
                sequence
                    .get_mut(*index)
                    .ok_or(PathError::IndexOutOfBounds {
                        path: walked.clone(),
                        index: *index,
                    })?
            },
        };
    }

    write_segment(&mut walked, last);
    match last {
        PathSegment::Key(key) => {
            let Some(mapping) = current.as_mapping_mut() else {
                return Err(PathError::Unindexable { path: walked });
            };
            mapping.insert(Value::String(key.clone()), value);
        },
        PathSegment::Index(index) => {
            let Some(sequence) = current.as_sequence_mut() else {
                return Err(PathError::Unindexable { path: walked });
            };
            let slot = sequence
                .get_mut(*index)
                .ok_or(PathError::IndexOutOfBounds {
                    path: walked,
                    index: *index,
                })?;
            *slot = value;
        },
    }
    Ok(())
}

/// Removes the key or element at `path`.
///
/// The root path resets the value to an empty mapping.
///
/// # Errors
///
/// Returns [`PathError::Missing`] if the addressed location does not exist.
pub fn delete_at(root: &mut Value, path: &DataPath) -> Result<(), PathError> {
    if path.is_root() {
        *root = Value::Mapping(Mapping::new());
        return Ok(());
    }

    let missing = || PathError::Missing {
        path: path.to_string(),
    };

    let (last, intermediate) = path.segments().split_last().expect("non-root path");
    let parent_path = DataPath {
        segments: intermediate.to_vec(),
    };
    let parent = extract_mut(root, &parent_path).ok_or_else(missing)?;

    match last {
        PathSegment::Key(key) => {
            let mapping = parent.as_mapping_mut().ok_or_else(missing)?;
            mapping.remove(key.as_str()).map(|_| ()).ok_or_else(missing)
        },
        PathSegment::Index(index) => {
            let sequence = parent.as_sequence_mut().ok_or_else(missing)?;
            if *index >= sequence.len() {
                return Err(missing());
            }
            sequence.remove(*index);
            Ok(())
        },
    }
}

/// Recursively merges `overlay` into `target`.
///
/// Mappings merge key-wise with overlay keys winning; sequences and scalars
/// are replaced wholesale.
pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (&mut *target, overlay) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, value) in src {
                match dest.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        dest.insert(key.clone(), value.clone());
                    },
                }
            }
        },
        (slot, other) => *slot = other.clone(),
    }
}

fn extract_mut<'a>(root: &'a mut Value, path: &DataPath) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.as_mapping_mut()?.get_mut(key.as_str())?,
            PathSegment::Index(index) => current.as_sequence_mut()?.get_mut(*index)?,
        };
    }
    Some(current)
}

fn write_segment(walked: &mut String, segment: &PathSegment) {
    use fmt::Write as _;
    match segment {
        PathSegment::Key(key) => {
            let _ = write!(walked, ".{key}");
        },
        PathSegment::Index(index) => {
            let _ = write!(walked, "[{index}]");
        },
    }
}
