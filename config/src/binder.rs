//! # Typed Binder
//!
//! Walks a normalized mapping and populates the typed [`Config`]. Each field
//! is converted through its type's rule chain (see [`crate::rules`]).
//!
//! Binding is strict: a key that matches no field, at any nesting level,
//! fails with [`BindError::UnknownKey`] naming the full dotted path. Binding
//! never finalizes.

use crate::config::Config;
use crate::error::BindError;
use crate::rules::{FromValue, convert};
use crate::value::{Map, Value};

/// Bind a normalized root mapping into a [`Config`].
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Third stage of the pipeline, after decoding and normalization.
///
/// ## Usage
/// ```rust
/// use replicate_config::binder::bind;
/// use replicate_config::decoder::decode;
///
/// let root = decode("log_level = \"INFO\"\nbogus = 1").unwrap();
/// let err = bind(&root).unwrap_err();
/// assert_eq!(err.path(), "bogus");
/// ```
///
/// ## Error Handling
/// Returns `BindError` for unknown keys, shape mismatches, and unknown
/// signal names.
pub fn bind(root: &Map) -> Result<Config, BindError> {
    bind_stanza(root, "")
}

/// An entity bound from a mapping of named fields.
pub(crate) trait Stanza: Sized {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError>;
}

/// Bind `map` as `T` and reject any key `T` did not ask for.
pub(crate) fn bind_stanza<T: Stanza>(map: &Map, path: &str) -> Result<T, BindError> {
    let mut fields = Fields::new(map, path);
    let bound = T::bind_fields(&mut fields)?;
    fields.finish()?;
    Ok(bound)
}

/// Field accessor over one mapping that records which keys were consumed.
pub(crate) struct Fields<'a> {
    map: &'a Map,
    path: &'a str,
    seen: Vec<&'static str>,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map, path: &'a str) -> Self {
        Self {
            map,
            path,
            seen: Vec::new(),
        }
    }

    /// Convert the value under `key`. Missing keys and explicit absence
    /// markers both leave the field unset.
    pub(crate) fn get<T: FromValue>(&mut self, key: &'static str) -> Result<Option<T>, BindError> {
        self.seen.push(key);
        match self.map.get(key) {
            None | Some(Value::Absent) => Ok(None),
            Some(value) => convert(value, &join_path(self.path, key)).map(Some),
        }
    }

    fn finish(self) -> Result<(), BindError> {
        match self.map.keys().find(|key| !self.seen.contains(&key.as_str())) {
            Some(key) => Err(BindError::UnknownKey {
                path: join_path(self.path, key),
            }),
            None => Ok(()),
        }
    }
}

pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}
