//! The dynamic [`PayloadValue`] carried by socket.io events and acknowledgements.
use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{
    Deserialize, Serialize,
    de::DeserializeOwned,
    ser::{SerializeMap, SerializeSeq},
};
use serde_json::{Number, Value};

use crate::Str;

/// A dynamic socket.io payload value.
///
/// It mirrors the JSON data model with an additional [`PayloadValue::Binary`] variant
/// for binary attachments. When serialized to JSON a binary value is written as a
/// placeholder: `{"_placeholder":true,"num":<num>}`, the bytes are sent separately
/// as an adjacent binary packet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PayloadValue {
    /// The JSON `null`
    #[default]
    Null,
    /// A JSON boolean
    Bool(bool),
    /// A JSON number
    Number(Number),
    /// A JSON string
    String(String),
    /// A JSON array
    Array(Vec<PayloadValue>),
    /// A JSON object, key order is irrelevant
    Object(BTreeMap<String, PayloadValue>),
    /// A binary attachment with its placeholder index
    Binary(usize, Bytes),
}

impl PayloadValue {
    /// Convert any serializable value to a [`PayloadValue`] through its JSON representation.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    /// Deserialize the value into `T`.
    ///
    /// Binary attachments are seen by `T` as sequences of bytes.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json_inner(false))
    }

    /// Convert the value to JSON, binary attachments are replaced by placeholders.
    pub fn to_json(&self) -> Value {
        self.to_json_inner(true)
    }

    fn to_json_inner(&self, placeholders: bool) -> Value {
        match self {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(*b),
            PayloadValue::Number(n) => Value::Number(n.clone()),
            PayloadValue::String(s) => Value::String(s.clone()),
            PayloadValue::Array(arr) => {
                Value::Array(arr.iter().map(|v| v.to_json_inner(placeholders)).collect())
            }
            PayloadValue::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_inner(placeholders)))
                    .collect(),
            ),
            PayloadValue::Binary(num, _) if placeholders => {
                serde_json::json!({ "_placeholder": true, "num": num })
            }
            PayloadValue::Binary(_, data) => {
                Value::Array(data.iter().map(|b| Value::from(*b)).collect())
            }
        }
    }

    /// Returns true if the value is [`PayloadValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, PayloadValue::Null)
    }
    /// Returns the boolean if the value is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PayloadValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
    /// Returns the string if the value is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }
    /// Returns the number as an `i64` if it is representable
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PayloadValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }
    /// Returns the number as an `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PayloadValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }
    /// Returns the elements if the value is an array
    pub fn as_array(&self) -> Option<&[PayloadValue]> {
        match self {
            PayloadValue::Array(arr) => Some(arr),
            _ => None,
        }
    }
    /// Returns the map if the value is an object
    pub fn as_object(&self) -> Option<&BTreeMap<String, PayloadValue>> {
        match self {
            PayloadValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
    /// Returns the bytes if the value is a binary attachment
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            PayloadValue::Binary(_, data) => Some(data),
            _ => None,
        }
    }
    /// Get the value of `key` if the value is an object
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Returns true if a binary attachment is present anywhere in the value
    pub fn has_binary(&self) -> bool {
        match self {
            PayloadValue::Binary(..) => true,
            PayloadValue::Array(arr) => arr.iter().any(PayloadValue::has_binary),
            PayloadValue::Object(obj) => obj.values().any(PayloadValue::has_binary),
            _ => false,
        }
    }

    /// Visit every value of the tree, depth first, parents before their children.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut PayloadValue)) {
        f(self);
        match self {
            PayloadValue::Array(arr) => arr.iter_mut().for_each(|v| v.visit_mut(f)),
            PayloadValue::Object(obj) => obj.values_mut().for_each(|v| v.visit_mut(f)),
            _ => (),
        }
    }

    /// Visit every binary attachment of the tree, depth first.
    pub fn visit_binaries(&self, f: &mut impl FnMut(usize, &Bytes)) {
        match self {
            PayloadValue::Binary(num, data) => f(*num, data),
            PayloadValue::Array(arr) => arr.iter().for_each(|v| v.visit_binaries(f)),
            PayloadValue::Object(obj) => obj.values().for_each(|v| v.visit_binaries(f)),
            _ => (),
        }
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PayloadValue::Null => serializer.serialize_unit(),
            PayloadValue::Bool(b) => serializer.serialize_bool(*b),
            PayloadValue::Number(n) => n.serialize(serializer),
            PayloadValue::String(s) => serializer.serialize_str(s),
            PayloadValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            PayloadValue::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            PayloadValue::Binary(num, _) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("_placeholder", &true)?;
                map.serialize_entry("num", num)?;
                map.end()
            }
        }
    }
}

/// Placeholders are kept as plain objects, they are resolved by the parser.
impl<'de> Deserialize<'de> for PayloadValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(PayloadValue::from)
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => PayloadValue::Number(n),
            Value::String(s) => PayloadValue::String(s),
            Value::Array(arr) => PayloadValue::Array(arr.into_iter().map(Into::into).collect()),
            Value::Object(obj) => {
                PayloadValue::Object(obj.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<()> for PayloadValue {
    fn from(_: ()) -> Self {
        PayloadValue::Null
    }
}
impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}
impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}
impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::String(value)
    }
}
impl From<Str> for PayloadValue {
    fn from(value: Str) -> Self {
        PayloadValue::String(value.into())
    }
}
impl From<f64> for PayloadValue {
    /// Non finite numbers are converted to [`PayloadValue::Null`], as in JSON.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(PayloadValue::Null, PayloadValue::Number)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PayloadValue {
            fn from(value: $ty) -> Self {
                PayloadValue::Number(value.into())
            }
        })*
    };
}
impl_from_int!(i8, i16, i32, i64, u16, u32, u64, isize, usize);

/// A binary attachment. Its index is set when it is put in a packet.
impl From<Bytes> for PayloadValue {
    fn from(value: Bytes) -> Self {
        PayloadValue::Binary(0, value)
    }
}
impl<T: Into<PayloadValue>> From<Vec<T>> for PayloadValue {
    fn from(value: Vec<T>) -> Self {
        PayloadValue::Array(value.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<PayloadValue>> From<Option<T>> for PayloadValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PayloadValue::Null, Into::into)
    }
}
impl<T: Into<PayloadValue>> From<BTreeMap<String, T>> for PayloadValue {
    fn from(value: BTreeMap<String, T>) -> Self {
        PayloadValue::Object(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_is_lossless() {
        let json = json!({
            "a": [1, 2.5, -3, null, true, "str"],
            "b": { "c": {} },
            "_placeholder": true,
            "num": 0
        });
        let value = PayloadValue::from(json.clone());
        assert_eq!(value.to_json(), json);
        assert!(!value.has_binary());
    }

    #[test]
    fn binary_to_placeholder() {
        let value = PayloadValue::Array(vec![
            PayloadValue::from("data"),
            PayloadValue::Binary(1, Bytes::from_static(&[1, 2])),
        ]);
        assert!(value.has_binary());
        assert_eq!(
            value.to_json(),
            json!(["data", { "_placeholder": true, "num": 1 }])
        );
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"["data",{"_placeholder":true,"num":1}]"#
        );
    }

    #[test]
    fn typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct User {
            name: String,
            age: u8,
            tags: Vec<String>,
        }
        let user = User {
            name: "Ada".into(),
            age: 36,
            tags: vec!["admin".into()],
        };
        let value = PayloadValue::from_serialize(&user).unwrap();
        assert_eq!(value.get("name").and_then(PayloadValue::as_str), Some("Ada"));
        assert_eq!(value.get("age").and_then(PayloadValue::as_i64), Some(36));
        assert_eq!(value.deserialize::<User>().unwrap(), user);
    }

    #[test]
    fn deserialize_binary_as_bytes() {
        let value = PayloadValue::Array(vec![
            PayloadValue::from("file"),
            PayloadValue::Binary(0, Bytes::from_static(&[1, 2, 3])),
        ]);
        let (name, data) = value.deserialize::<(String, Bytes)>().unwrap();
        assert_eq!(name, "file");
        assert_eq!(data, Bytes::from_static(&[1, 2, 3]));
    }

    #[test]
    fn conversions() {
        assert_eq!(PayloadValue::from(f64::NAN), PayloadValue::Null);
        assert_eq!(PayloadValue::from(5).as_i64(), Some(5));
        assert_eq!(PayloadValue::from(2.5).as_f64(), Some(2.5));
        assert_eq!(PayloadValue::from(None::<bool>), PayloadValue::Null);
        assert_eq!(
            PayloadValue::from(vec![1, 2]),
            PayloadValue::Array(vec![1.into(), 2.into()])
        );
        assert_eq!(
            PayloadValue::from(Bytes::from_static(b"a")).as_binary(),
            Some(&Bytes::from_static(b"a"))
        );
    }
}
