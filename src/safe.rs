//! Fail-fast typed access over untrusted decoded values
//!
//! Wraps a decoded [`ciborium::value::Value`] together with a diagnostic path
//! (e.g. `$.foo[2].bar`). Every typed accessor either returns the
//! correctly-typed payload or fails with an error naming the expected type,
//! the actual type, and the path. Nothing is ever coerced silently.
//!
//! Navigation composes: `as_object()` / `as_array()` return wrappers whose
//! own accessors hand back [`SafeValue`]s, so nested lookups never need
//! manual rewrapping.

use crate::error::{StashError, StashResult};
use ciborium::value::Value;
use std::fmt;

/// The classification of a decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    String,
    /// A float, or an integer that fits `i64`
    Number,
    /// An integer wider than `i64`
    BigInt,
    Boolean,
    Bytes,
    Array,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::String => "string",
            Self::Number => "number",
            Self::BigInt => "bigint",
            Self::Boolean => "boolean",
            Self::Bytes => "bytes",
            Self::Array => "array",
            Self::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// Best-effort type label for error messages, including values that do not
/// classify (tags).
fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Text(_) => "string",
        Value::Integer(i) => {
            if i64::try_from(i128::from(*i)).is_ok() {
                "number"
            } else {
                "bigint"
            }
        }
        Value::Float(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Bytes(_) => "bytes",
        Value::Array(_) => "array",
        Value::Map(_) => "object",
        _ => "tag",
    }
}

const NULL: &Value = &Value::Null;

/// A decoded value paired with the path it was found at
#[derive(Debug, Clone)]
pub struct SafeValue<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> SafeValue<'a> {
    /// Wrap a root value; its path is `$`
    pub fn new(value: &'a Value) -> Self {
        Self::at(value, "$")
    }

    pub(crate) fn at(value: &'a Value, path: impl Into<String>) -> Self {
        Self {
            value,
            path: path.into(),
        }
    }

    /// The diagnostic path of this value
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw decoded value
    pub fn raw(&self) -> &'a Value {
        self.value
    }

    /// Classify the value into exactly one [`ValueKind`].
    ///
    /// A value that matches no kind (a CBOR tag) is a decoder bug, surfaced
    /// as an internal error rather than reinterpreted.
    pub fn kind(&self) -> StashResult<ValueKind> {
        match self.value {
            Value::Null => Ok(ValueKind::Null),
            Value::Text(_) => Ok(ValueKind::String),
            Value::Integer(i) => {
                if i64::try_from(i128::from(*i)).is_ok() {
                    Ok(ValueKind::Number)
                } else {
                    Ok(ValueKind::BigInt)
                }
            }
            Value::Float(_) => Ok(ValueKind::Number),
            Value::Bool(_) => Ok(ValueKind::Boolean),
            Value::Bytes(_) => Ok(ValueKind::Bytes),
            Value::Array(_) => Ok(ValueKind::Array),
            Value::Map(_) => Ok(ValueKind::Object),
            other => Err(StashError::Internal(format!(
                "encountered unclassifiable value at {}: {other:?}",
                self.path
            ))),
        }
    }

    fn mismatch(&self, expected: &'static str) -> StashError {
        StashError::decode(&self.path, expected, type_label(self.value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.value, Value::Text(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind(), Ok(ValueKind::Number))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.value, Value::Bool(_))
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self.value, Value::Bytes(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.value, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.value, Value::Map(_))
    }

    /// The string payload, or a typed error
    pub fn as_str(&self) -> StashResult<&'a str> {
        match self.value {
            Value::Text(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }

    /// The numeric payload as `f64`; integer-backed numbers convert
    pub fn as_number(&self) -> StashResult<f64> {
        match self.value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => i64::try_from(i128::from(*i))
                .map(|v| v as f64)
                .map_err(|_| self.mismatch("number")),
            _ => Err(self.mismatch("number")),
        }
    }

    /// The integer payload as `i64`; floats do not convert
    pub fn as_i64(&self) -> StashResult<i64> {
        match self.value {
            Value::Integer(i) => {
                i64::try_from(i128::from(*i)).map_err(|_| self.mismatch("integer"))
            }
            _ => Err(self.mismatch("integer")),
        }
    }

    /// Any integer payload, including ones wider than `i64`
    pub fn as_i128(&self) -> StashResult<i128> {
        match self.value {
            Value::Integer(i) => Ok(i128::from(*i)),
            _ => Err(self.mismatch("integer")),
        }
    }

    pub fn as_bool(&self) -> StashResult<bool> {
        match self.value {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch("boolean")),
        }
    }

    pub fn as_null(&self) -> StashResult<()> {
        match self.value {
            Value::Null => Ok(()),
            _ => Err(self.mismatch("null")),
        }
    }

    pub fn as_bytes(&self) -> StashResult<&'a [u8]> {
        match self.value {
            Value::Bytes(b) => Ok(b),
            _ => Err(self.mismatch("bytes")),
        }
    }

    pub fn as_array(&self) -> StashResult<SafeArray<'a>> {
        match self.value {
            Value::Array(items) => Ok(SafeArray {
                items,
                path: self.path.clone(),
            }),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn as_object(&self) -> StashResult<SafeObject<'a>> {
        match self.value {
            Value::Map(entries) => Ok(SafeObject {
                entries,
                path: self.path.clone(),
            }),
            _ => Err(self.mismatch("object")),
        }
    }
}

/// A decoded key-ordered mapping with path-aware navigation
#[derive(Debug, Clone)]
pub struct SafeObject<'a> {
    entries: &'a [(Value, Value)],
    path: String,
}

impl<'a> SafeObject<'a> {
    /// Wrap root map entries; the path is `$`
    pub fn new(entries: &'a [(Value, Value)]) -> Self {
        Self {
            entries,
            path: "$".to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first entry for `key`. Non-text keys are decoder bugs.
    fn lookup(&self, key: &str) -> StashResult<Option<&'a Value>> {
        for (entry_key, entry_value) in self.entries {
            match entry_key {
                Value::Text(name) if name == key => return Ok(Some(entry_value)),
                Value::Text(_) => {}
                other => {
                    return Err(StashError::decode(&self.path, "string key", type_label(other)))
                }
            }
        }
        Ok(None)
    }

    fn text_key(&self, entry_key: &'a Value) -> StashResult<&'a str> {
        match entry_key {
            Value::Text(name) => Ok(name),
            other => Err(StashError::decode(&self.path, "string key", type_label(other))),
        }
    }

    /// Get the value for a single key. A missing key yields a null-classified
    /// [`SafeValue`], never an error.
    pub fn get_single(&self, key: &str) -> StashResult<SafeValue<'a>> {
        let child_path = format!("{}.{key}", self.path);
        Ok(match self.lookup(key)? {
            Some(value) => SafeValue::at(value, child_path),
            None => SafeValue::at(NULL, child_path),
        })
    }

    /// Get the value for a single key. A missing key is an error.
    pub fn sure_get_single(&self, key: &str) -> StashResult<SafeValue<'a>> {
        match self.lookup(key)? {
            Some(value) => Ok(SafeValue::at(value, format!("{}.{key}", self.path))),
            None => Err(StashError::missing_key(&self.path, key)),
        }
    }

    /// Walk a key path. The moment a key is absent or the value at that point
    /// is null, the walk stops and returns a null-classified [`SafeValue`].
    /// A non-object, non-null intermediate value is a typed error.
    ///
    /// ```
    /// # use ciborium::value::Value;
    /// # use stash::safe::SafeObject;
    /// let entries = vec![(Value::Text("foo".into()), Value::Null)];
    /// let object = SafeObject::new(&entries);
    /// assert!(object.get(&["foo", "bar", "baz"]).unwrap().is_null());
    /// ```
    pub fn get(&self, keys: &[&str]) -> StashResult<SafeValue<'a>> {
        let (first, rest) = keys
            .split_first()
            .ok_or_else(|| StashError::Internal("expected at least one key".to_string()))?;

        let value = self.get_single(first)?;
        if value.is_null() || rest.is_empty() {
            return Ok(value);
        }

        value.as_object()?.get(rest)
    }

    /// Walk a key path strictly: any missing key is an immediate error. A
    /// null before the final key fails too, since null cannot be navigated.
    pub fn sure_get(&self, keys: &[&str]) -> StashResult<SafeValue<'a>> {
        let (first, rest) = keys
            .split_first()
            .ok_or_else(|| StashError::Internal("expected at least one key".to_string()))?;

        let value = self.sure_get_single(first)?;
        if rest.is_empty() {
            return Ok(value);
        }

        value.as_object()?.sure_get(rest)
    }

    /// The keys in map order
    pub fn keys(&self) -> StashResult<Vec<&'a str>> {
        self.entries
            .iter()
            .map(|(key, _)| self.text_key(key))
            .collect()
    }

    /// The values in map order, each wrapped with its path
    pub fn values(&self) -> StashResult<Vec<SafeValue<'a>>> {
        self.entries
            .iter()
            .map(|(key, value)| {
                let name = self.text_key(key)?;
                Ok(SafeValue::at(value, format!("{}.{name}", self.path)))
            })
            .collect()
    }

    /// Visit every entry in map order
    pub fn for_each<F>(&self, mut f: F) -> StashResult<()>
    where
        F: FnMut(SafeValue<'a>, &'a str),
    {
        for (key, value) in self.entries {
            let name = self.text_key(key)?;
            f(SafeValue::at(value, format!("{}.{name}", self.path)), name);
        }
        Ok(())
    }

    /// Map every entry in map order
    pub fn map<T, F>(&self, mut f: F) -> StashResult<Vec<T>>
    where
        F: FnMut(SafeValue<'a>, &'a str) -> T,
    {
        let mut out = Vec::with_capacity(self.entries.len());
        self.for_each(|value, key| out.push(f(value, key)))?;
        Ok(out)
    }
}

/// A decoded ordered sequence with path-aware navigation
#[derive(Debug, Clone)]
pub struct SafeArray<'a> {
    items: &'a [Value],
    path: String,
}

impl<'a> SafeArray<'a> {
    /// Wrap root items; the path is `$`
    pub fn new(items: &'a [Value]) -> Self {
        Self {
            items,
            path: "$".to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the element at `index`. An out-of-range index yields a
    /// null-classified [`SafeValue`].
    pub fn get(&self, index: usize) -> SafeValue<'a> {
        let child_path = format!("{}[{index}]", self.path);
        match self.items.get(index) {
            Some(value) => SafeValue::at(value, child_path),
            None => SafeValue::at(NULL, child_path),
        }
    }

    /// Get the element at `index`. An out-of-range index is an error.
    pub fn sure_get(&self, index: usize) -> StashResult<SafeValue<'a>> {
        match self.items.get(index) {
            Some(value) => Ok(SafeValue::at(value, format!("{}[{index}]", self.path))),
            None => Err(StashError::missing_key(&self.path, index.to_string())),
        }
    }

    /// Iterate elements in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = SafeValue<'a>> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(index, value)| SafeValue::at(value, format!("{}[{index}]", self.path)))
    }

    /// The elements in ascending index order
    pub fn values(&self) -> Vec<SafeValue<'a>> {
        self.iter().collect()
    }

    /// Visit every element in ascending index order
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(SafeValue<'a>, usize),
    {
        for (index, value) in self.iter().enumerate() {
            f(value, index);
        }
    }

    /// Map every element in ascending index order
    pub fn map<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(SafeValue<'a>, usize) -> T,
    {
        self.iter().enumerate().map(|(index, value)| f(value, index)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn entry(key: &str, value: Value) -> (Value, Value) {
        (text(key), value)
    }

    #[test]
    fn classification_covers_every_kind() {
        let cases: Vec<(Value, ValueKind)> = vec![
            (Value::Null, ValueKind::Null),
            (text("hello"), ValueKind::String),
            (Value::Integer(12341.into()), ValueKind::Number),
            (Value::Integer(u64::MAX.into()), ValueKind::BigInt),
            (Value::Float(0.5), ValueKind::Number),
            (Value::Bool(true), ValueKind::Boolean),
            (Value::Bytes(vec![1, 2]), ValueKind::Bytes),
            (Value::Array(vec![Value::Integer(20.into())]), ValueKind::Array),
            (Value::Map(vec![entry("foo", text("bar"))]), ValueKind::Object),
        ];

        for (value, expected) in &cases {
            assert_eq!(SafeValue::new(value).kind().unwrap(), *expected);
        }
    }

    #[test]
    fn accessors_reject_every_other_kind() {
        type Accessor = fn(&SafeValue<'_>) -> bool;
        let accessors: Vec<(ValueKind, Accessor)> = vec![
            (ValueKind::String, |v| v.as_str().is_ok()),
            (ValueKind::Number, |v| v.as_number().is_ok()),
            (ValueKind::Boolean, |v| v.as_bool().is_ok()),
            (ValueKind::Null, |v| v.as_null().is_ok()),
            (ValueKind::Bytes, |v| v.as_bytes().is_ok()),
            (ValueKind::Array, |v| v.as_array().is_ok()),
            (ValueKind::Object, |v| v.as_object().is_ok()),
        ];
        let values: Vec<Value> = vec![
            text("hello"),
            Value::Integer(7.into()),
            Value::Bool(false),
            Value::Null,
            Value::Bytes(vec![9]),
            Value::Array(vec![]),
            Value::Map(vec![]),
        ];

        for (value, (kind, _)) in values.iter().zip(&accessors) {
            let safe = SafeValue::new(value);
            assert_eq!(safe.kind().unwrap(), *kind);
            for (other_kind, accessor) in &accessors {
                assert_eq!(accessor(&safe), other_kind == kind, "{kind} vs {other_kind}");
            }
        }
    }

    #[test]
    fn mismatch_reports_expected_actual_and_path() {
        let value = text("hello");
        let err = SafeValue::at(&value, "$.foo").as_number().unwrap_err();
        match err {
            StashError::Decode {
                path,
                expected,
                actual,
            } => {
                assert_eq!(path, "$.foo");
                assert_eq!(expected, "number");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn get_stops_at_null_without_error() {
        let entries = vec![entry("a", Value::Null)];
        let object = SafeObject::new(&entries);

        let value = object.get(&["a", "b"]).unwrap();
        assert!(value.is_null());
        assert_eq!(value.path(), "$.a");
    }

    #[test]
    fn get_returns_null_for_missing_paths() {
        let entries = vec![];
        let object = SafeObject::new(&entries);

        assert!(object.get(&["foo"]).unwrap().is_null());
        assert!(object.get(&["foo", "bar", "bin", "baz"]).unwrap().is_null());
    }

    #[test]
    fn get_walks_nested_objects() {
        let entries = vec![entry(
            "foo",
            Value::Map(vec![entry(
                "bar",
                Value::Map(vec![entry("baz", text("Hello"))]),
            )]),
        )];
        let object = SafeObject::new(&entries);

        let value = object.get(&["foo", "bar", "baz"]).unwrap();
        assert_eq!(value.as_str().unwrap(), "Hello");
        assert_eq!(value.path(), "$.foo.bar.baz");
    }

    #[test]
    fn get_fails_on_non_object_intermediate() {
        let entries = vec![entry("foo", text("hello"))];
        let object = SafeObject::new(&entries);

        let err = object.get(&["foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("$.foo"), "{err}");
    }

    #[test]
    fn sure_get_requires_every_key() {
        let empty: Vec<(Value, Value)> = vec![];
        assert!(SafeObject::new(&empty).sure_get(&["foo"]).is_err());
        assert!(SafeObject::new(&empty).sure_get(&["foo", "bar"]).is_err());

        let with_null = vec![entry("a", Value::Null)];
        let err = SafeObject::new(&with_null).sure_get(&["a", "b"]).unwrap_err();
        assert!(err.to_string().contains("$.a"), "{err}");

        // null as the final key is fine
        assert!(SafeObject::new(&with_null).sure_get(&["a"]).unwrap().is_null());
    }

    #[test]
    fn sure_get_walks_nested_objects() {
        let entries = vec![entry(
            "foo",
            Value::Map(vec![entry("bar", Value::Integer(12.into()))]),
        )];
        let value = SafeObject::new(&entries).sure_get(&["foo", "bar"]).unwrap();
        assert_eq!(value.as_i64().unwrap(), 12);
    }

    #[test]
    fn object_iteration_preserves_order() {
        let entries = vec![
            entry("zeta", text("one")),
            entry("alpha", text("two")),
            entry("mid", text("three")),
        ];
        let object = SafeObject::new(&entries);

        assert_eq!(object.keys().unwrap(), vec!["zeta", "alpha", "mid"]);

        let mut seen = Vec::new();
        object
            .for_each(|value, key| seen.push((key, value.as_str().unwrap())))
            .unwrap();
        assert_eq!(
            seen,
            vec![("zeta", "one"), ("alpha", "two"), ("mid", "three")]
        );

        let mapped = object.map(|value, key| format!("{key}={}", value.as_str().unwrap())).unwrap();
        assert_eq!(mapped, vec!["zeta=one", "alpha=two", "mid=three"]);
    }

    #[test]
    fn non_text_keys_are_decoder_bugs() {
        let entries = vec![(Value::Integer(1.into()), text("x"))];
        let object = SafeObject::new(&entries);
        assert!(object.keys().is_err());
        assert!(object.get_single("anything").is_err());
    }

    #[test]
    fn array_get_split_between_lenient_and_strict() {
        let items = vec![text("foo"), text("bar")];
        let array = SafeArray::new(&items);

        assert_eq!(array.get(1).as_str().unwrap(), "bar");
        assert!(array.get(5).is_null());
        assert_eq!(array.get(5).path(), "$[5]");
        assert!(array.sure_get(5).is_err());
    }

    #[test]
    fn array_visits_in_ascending_order() {
        let items = vec![text("foo"), text("bar"), text("bin"), text("baz")];
        let array = SafeArray::new(&items);

        let mut indexes = Vec::new();
        array.for_each(|value, index| {
            assert_eq!(value.as_str().unwrap(), ["foo", "bar", "bin", "baz"][index]);
            indexes.push(index);
        });
        assert_eq!(indexes, vec![0, 1, 2, 3]);

        let mapped = array.map(|value, _| value.as_str().unwrap().to_string());
        assert_eq!(mapped, vec!["foo", "bar", "bin", "baz"]);
    }

    #[test]
    fn nested_paths_compose_through_arrays() {
        let entries = vec![entry(
            "items",
            Value::Array(vec![Value::Map(vec![entry("name", text("first"))])]),
        )];
        let object = SafeObject::new(&entries);

        let items = object.sure_get_single("items").unwrap();
        let first = items.as_array().unwrap().sure_get(0).unwrap();
        let name = first.as_object().unwrap().sure_get_single("name").unwrap();

        assert_eq!(name.path(), "$.items[0].name");
        assert_eq!(name.as_str().unwrap(), "first");
    }

    #[test]
    fn bytes_round_trip() {
        let value = Value::Bytes(vec![12, 13, 5, 8, 14]);
        assert_eq!(SafeValue::new(&value).as_bytes().unwrap(), &[12, 13, 5, 8, 14]);
    }
}
