use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Which part of the result a chunk updates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiElement {
    GeneralAnswer,
    /// `recommendation_<N>`.
    Recommendation(usize),
    FollowupQuestions,
    Sources,
    IsLast,
    /// Tags this client does not know about are carried through untouched.
    Unknown(String),
    #[default]
    Missing,
}

impl UiElement {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "general_answer" => Self::GeneralAnswer,
            "followup_questions" => Self::FollowupQuestions,
            "sources" => Self::Sources,
            "is_last" => Self::IsLast,
            other => recommendation_index(other)
                .map(Self::Recommendation)
                .unwrap_or_else(|| Self::Unknown(other.to_string())),
        }
    }

    pub fn tag(&self) -> String {
        match self {
            Self::GeneralAnswer => "general_answer".to_string(),
            Self::Recommendation(n) => format!("recommendation_{n}"),
            Self::FollowupQuestions => "followup_questions".to_string(),
            Self::Sources => "sources".to_string(),
            Self::IsLast => "is_last".to_string(),
            Self::Unknown(tag) => tag.clone(),
            Self::Missing => String::new(),
        }
    }
}

fn recommendation_index(tag: &str) -> Option<usize> {
    let digits = tag.strip_prefix("recommendation_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl<'de> Deserialize<'de> for UiElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::String(tag)) => Self::parse(&tag),
            Some(other) => Self::Unknown(other.to_string()),
        })
    }
}

/// Accepts any non-null scalar; numbers keep their JSON spelling.
fn lenient_request_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        v @ (Value::Number(_) | Value::Bool(_)) => Ok(v.to_string()),
        other => Err(D::Error::custom(format!("invalid request_id: {other}"))),
    }
}

/// Accepts integers, integral floats and numeric strings.
fn lenient_chunk_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    parsed.ok_or_else(|| D::Error::custom(format!("invalid chunk_id: {value}")))
}

fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

impl Serialize for UiElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

/// One object decoded from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(deserialize_with = "lenient_request_id")]
    pub request_id: String,
    #[serde(deserialize_with = "lenient_chunk_id")]
    pub chunk_id: i64,
    #[serde(default)]
    pub ui_element: UiElement,
    #[serde(default)]
    pub content: Value,
}

/// A cited page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: String,
}

/// What an extracted span turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Chunk(StreamChunk),
    /// Any other JSON value: the endpoint's non-chunked response shape.
    Opaque(Value),
}

/// Parse one extracted span.
///
/// An object carrying both `request_id` and `chunk_id` is a chunk (a zero
/// `chunk_id` counts). Everything else that parses is opaque.
pub fn decode(text: &str) -> serde_json::Result<Decoded> {
    let value: Value = serde_json::from_str(text)?;
    let is_chunk = value
        .as_object()
        .is_some_and(|o| o.contains_key("request_id") && o.contains_key("chunk_id"));

    if is_chunk {
        Ok(Decoded::Chunk(serde_json::from_value(value)?))
    } else {
        Ok(Decoded::Opaque(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_map_to_variants() {
        assert_eq!(UiElement::parse("general_answer"), UiElement::GeneralAnswer);
        assert_eq!(UiElement::parse("recommendation_0"), UiElement::Recommendation(0));
        assert_eq!(UiElement::parse("recommendation_12"), UiElement::Recommendation(12));
        assert_eq!(UiElement::parse("is_last"), UiElement::IsLast);
        assert_eq!(
            UiElement::parse("recommendation_"),
            UiElement::Unknown("recommendation_".into())
        );
        assert_eq!(
            UiElement::parse("recommendation_-1"),
            UiElement::Unknown("recommendation_-1".into())
        );
        assert_eq!(
            UiElement::parse("recommendation_1a"),
            UiElement::Unknown("recommendation_1a".into())
        );
        assert_eq!(UiElement::parse("map_pin"), UiElement::Unknown("map_pin".into()));
    }

    #[test]
    fn tag_survives_serialization() {
        let chunk = StreamChunk {
            request_id: "r1".into(),
            chunk_id: 4,
            ui_element: UiElement::Recommendation(3),
            content: json!({ "name": "Cafe" }),
        };
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(v["ui_element"], "recommendation_3");
    }

    #[test]
    fn zero_chunk_id_is_still_a_chunk() {
        let d = decode(r#"{"request_id":"r1","chunk_id":0,"ui_element":"general_answer","content":"hi"}"#)
            .unwrap();
        match d {
            Decoded::Chunk(c) => {
                assert_eq!(c.chunk_id, 0);
                assert_eq!(c.ui_element, UiElement::GeneralAnswer);
                assert_eq!(c.content, json!("hi"));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn missing_fields_default() {
        let d = decode(r#"{"request_id":"r1","chunk_id":7}"#).unwrap();
        let Decoded::Chunk(c) = d else { panic!("expected chunk") };
        assert_eq!(c.ui_element, UiElement::Missing);
        assert_eq!(c.content, Value::Null);
    }

    #[test]
    fn other_shapes_are_opaque() {
        let d = decode(r#"{"answer":"full response"}"#).unwrap();
        assert_eq!(d, Decoded::Opaque(json!({ "answer": "full response" })));

        let d = decode(r#"{"request_id":"r1"}"#).unwrap();
        assert!(matches!(d, Decoded::Opaque(_)));
    }

    fn chunk_of(text: &str) -> StreamChunk {
        match decode(text) {
            Ok(Decoded::Chunk(c)) => c,
            other => panic!("expected chunk from {text}, got {other:?}"),
        }
    }

    #[test]
    fn chunk_id_accepts_strings_and_integral_floats() {
        let c = chunk_of(r#"{"request_id":"r1","chunk_id":"0","ui_element":"general_answer","content":"Hello"}"#);
        assert_eq!(c.chunk_id, 0);
        assert_eq!(c.content, json!("Hello"));

        let c = chunk_of(r#"{"request_id":"r1","chunk_id":1.0,"ui_element":"general_answer","content":"Hello"}"#);
        assert_eq!(c.chunk_id, 1);

        let c = chunk_of(r#"{"request_id":"r1","chunk_id":" 12 ","ui_element":"sources"}"#);
        assert_eq!(c.chunk_id, 12);
    }

    #[test]
    fn numeric_request_id_becomes_string() {
        let c = chunk_of(r#"{"request_id":7,"chunk_id":0,"ui_element":"general_answer","content":"Hello"}"#);
        assert_eq!(c.request_id, "7");
        assert_eq!(c.ui_element, UiElement::GeneralAnswer);
    }

    #[test]
    fn odd_ui_element_values() {
        let c = chunk_of(r#"{"request_id":"r1","chunk_id":0,"ui_element":null,"content":"Hello"}"#);
        assert_eq!(c.ui_element, UiElement::Missing);

        let c = chunk_of(r#"{"request_id":"r1","chunk_id":0,"ui_element":3,"content":"Hello"}"#);
        assert_eq!(c.ui_element, UiElement::Unknown("3".into()));
    }

    #[test]
    fn malformed_text_errors() {
        assert!(decode("{not json}").is_err());
        assert!(decode(r#"{"request_id":"r1","chunk_id":"zero"}"#).is_err());
        assert!(decode(r#"{"request_id":"r1","chunk_id":1.5}"#).is_err());
        assert!(decode(r#"{"request_id":null,"chunk_id":1}"#).is_err());
    }
}
