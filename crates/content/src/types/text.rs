use serde_json::Value as Json;

use crate::structure::PropertyDef;
use crate::types::ContentType;
use crate::Error;
use repo::Value;

/// Single-line text. Multi-occurrence declarations hold an ordered
/// string collection instead of a scalar.
pub struct TextLine;

/// Multi-line text. Same persisted shape as [`TextLine`]; the types
/// differ in form semantics, not storage.
pub struct TextArea;

fn encode_text(def: &PropertyDef, value: &Json) -> Result<Value, Error> {
    if def.is_multiple() {
        let Some(items) = value.as_array() else {
            return Err(Error::validation(format!(
                "property {:?} expects a list of strings",
                def.name
            )));
        };
        let mut strings = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) => strings.push(s.to_owned()),
                None => {
                    return Err(Error::validation(format!(
                        "property {:?} expects string elements",
                        def.name
                    )))
                }
            }
        }
        let count = strings.len() as u32;
        if let Some(min) = def.min_occurs {
            if count < min {
                return Err(Error::validation(format!(
                    "property {:?} needs at least {min} values, got {count}",
                    def.name
                )));
            }
        }
        if let Some(max) = def.max_occurs {
            if count > max {
                return Err(Error::validation(format!(
                    "property {:?} allows at most {max} values, got {count}",
                    def.name
                )));
            }
        }
        Ok(Value::Strings(strings))
    } else {
        match value.as_str() {
            Some(s) => Ok(Value::String(s.to_owned())),
            None => Err(Error::validation(format!(
                "property {:?} expects a string",
                def.name
            ))),
        }
    }
}

fn decode_text(stored: &Value) -> Json {
    match stored {
        Value::String(s) => Json::String(s.clone()),
        Value::Strings(items) => Json::Array(
            items
                .iter()
                .map(|s| Json::String(s.clone()))
                .collect(),
        ),
        _ => Json::Null,
    }
}

impl ContentType for TextLine {
    fn encode(&self, def: &PropertyDef, value: &Json) -> Result<Value, Error> {
        encode_text(def, value)
    }

    fn decode(&self, _def: &PropertyDef, stored: &Value) -> Json {
        decode_text(stored)
    }
}

impl ContentType for TextArea {
    fn encode(&self, def: &PropertyDef, value: &Json) -> Result<Value, Error> {
        encode_text(def, value)
    }

    fn decode(&self, _def: &PropertyDef, stored: &Value) -> Json {
        decode_text(stored)
    }
}
