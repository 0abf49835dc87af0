//! Structural shape descriptors and the matcher that checks JSON values
//! against them
//!
//! A [`Shape`] is deliberately small: scalar kinds, objects with per-field
//! `required` flags, homogeneous arrays and a nullable wrapper. Matching is
//! pure and reports every mismatch with a path (`$` for the root value,
//! `user.email`, `items[2].id` below it).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Structural description of a JSON value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Any JSON string
    String,
    /// Any JSON number
    Number,
    /// `true` or `false`
    Boolean,
    /// Object with declared fields
    Object {
        /// Declared fields by name
        #[serde(default)]
        fields: BTreeMap<String, FieldSpec>,
        /// Whether undeclared fields are tolerated
        #[serde(default)]
        allow_extra: bool,
    },
    /// Array whose elements all match `element`
    Array {
        /// Element shape
        element: Box<Shape>,
    },
    /// `null` or a value matching `inner`
    Nullable {
        /// Shape of non-null values
        inner: Box<Shape>,
    },
}

/// One declared object field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Expected shape of the value
    pub shape: Shape,
    /// Whether the field must be present
    #[serde(default = "required_by_default")]
    pub required: bool,
}

fn required_by_default() -> bool {
    true
}

impl FieldSpec {
    /// Required field
    #[inline]
    #[must_use]
    pub fn required(shape: Shape) -> Self {
        Self {
            shape,
            required: true,
        }
    }

    /// Optional field
    #[inline]
    #[must_use]
    pub fn optional(shape: Shape) -> Self {
        Self {
            shape,
            required: false,
        }
    }
}

/// Malformed shape descriptor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// Object declares a field with an empty name
    #[error("empty field name at `{path}`")]
    EmptyFieldName {
        /// Path of the object
        path: String,
    },

    /// `nullable` directly wraps another `nullable`
    #[error("nested nullable at `{path}`")]
    NestedNullable {
        /// Path of the outer wrapper
        path: String,
    },
}

/// What went wrong at one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    /// Required field absent
    Missing,
    /// Value of the wrong kind
    WrongKind {
        /// Kind the shape asked for
        expected: &'static str,
        /// Kind actually found
        found: &'static str,
    },
    /// Field not declared on a closed object
    Unexpected,
}

/// A single structural mismatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Path of the offending value
    pub path: String,
    /// Mismatch kind
    pub kind: MismatchKind,
    /// Whether the offending position is required (root, array elements and
    /// required fields are)
    pub required: bool,
}

const ROOT: &str = "$";

fn field_path(parent: &str, key: &str) -> String {
    if parent == ROOT {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Kind name of a JSON value, as used in mismatch reports
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Shape {
    /// Object shape from `(name, spec)` pairs, closed to extra fields
    #[must_use]
    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldSpec)>,
        S: Into<String>,
    {
        Self::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            allow_extra: false,
        }
    }

    /// Array of `element`
    #[inline]
    #[must_use]
    pub fn array(element: Shape) -> Self {
        Self::Array {
            element: Box::new(element),
        }
    }

    /// `null` or `inner`
    #[inline]
    #[must_use]
    pub fn nullable(inner: Shape) -> Self {
        Self::Nullable {
            inner: Box::new(inner),
        }
    }

    /// Open an object shape to undeclared fields; no-op for other shapes
    #[must_use]
    pub fn allowing_extra(mut self) -> Self {
        if let Self::Object { allow_extra, .. } = &mut self {
            *allow_extra = true;
        }
        self
    }

    /// Kind name this shape expects
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
            Self::Nullable { inner } => inner.kind_name(),
        }
    }

    /// Check the descriptor itself for defects
    ///
    /// # Errors
    /// Returns `ShapeError` naming the first defective position
    pub fn validate(&self) -> Result<(), ShapeError> {
        self.validate_at(ROOT)
    }

    fn validate_at(&self, path: &str) -> Result<(), ShapeError> {
        match self {
            Self::String | Self::Number | Self::Boolean => Ok(()),
            Self::Object { fields, .. } => {
                for (name, spec) in fields {
                    if name.is_empty() {
                        return Err(ShapeError::EmptyFieldName {
                            path: path.to_string(),
                        });
                    }
                    spec.shape.validate_at(&field_path(path, name))?;
                }
                Ok(())
            }
            Self::Array { element } => element.validate_at(&format!("{path}[]")),
            Self::Nullable { inner } => {
                if matches!(**inner, Self::Nullable { .. }) {
                    return Err(ShapeError::NestedNullable {
                        path: path.to_string(),
                    });
                }
                inner.validate_at(path)
            }
        }
    }

    /// Whether the value matches without any mismatch
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        self.mismatches(value).is_empty()
    }

    /// Every mismatch between the value and this shape, sorted by path
    #[must_use]
    pub fn mismatches(&self, value: &Value) -> Vec<Mismatch> {
        let mut out = Vec::new();
        self.check(value, ROOT, true, &mut out);
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }

    fn check(&self, value: &Value, path: &str, required: bool, out: &mut Vec<Mismatch>) {
        let wrong_kind = |out: &mut Vec<Mismatch>| {
            out.push(Mismatch {
                path: path.to_string(),
                kind: MismatchKind::WrongKind {
                    expected: self.kind_name(),
                    found: value_kind(value),
                },
                required,
            });
        };

        match self {
            Self::Nullable { inner } => {
                if !value.is_null() {
                    inner.check(value, path, required, out);
                }
            }
            Self::String if !value.is_string() => wrong_kind(out),
            Self::Number if !value.is_number() => wrong_kind(out),
            Self::Boolean if !value.is_boolean() => wrong_kind(out),
            Self::String | Self::Number | Self::Boolean => {}
            Self::Array { element } => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        element.check(item, &format!("{path}[{i}]"), true, out);
                    }
                }
                None => wrong_kind(out),
            },
            Self::Object {
                fields,
                allow_extra,
            } => {
                let Some(map) = value.as_object() else {
                    wrong_kind(out);
                    return;
                };
                for (name, spec) in fields {
                    let child = field_path(path, name);
                    match map.get(name) {
                        Some(v) => spec.shape.check(v, &child, spec.required, out),
                        None if spec.required => out.push(Mismatch {
                            path: child,
                            kind: MismatchKind::Missing,
                            required: true,
                        }),
                        None => {}
                    }
                }
                if !allow_extra {
                    for key in map.keys().filter(|k| !fields.contains_key(*k)) {
                        out.push(Mismatch {
                            path: field_path(path, key),
                            kind: MismatchKind::Unexpected,
                            required: false,
                        });
                    }
                }
            }
        }
    }
}
