//! 去重键计算
//!
//! 键 = SHA-256(类型, 来源 agent, circle, 规范化载荷)。载荷按规范形式编码：
//! 对象键递归排序，数组保持顺序，数字取其 JSON 文本，所有变长片段带长度前缀，
//! 因此字段顺序不同但语义相同的载荷得到同一个键。
//!
use crate::event::Event;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DedupKey([u8; 32]);

impl DedupKey {
    pub(crate) fn of(event: &Event) -> Self {
        let mut hasher = Sha256::new();
        write_bytes(&mut hasher, event.event_type().as_bytes());
        write_id(&mut hasher, event.source_agent_id());
        write_id(&mut hasher, event.circle_id());
        hasher.update(content_hash(event.data()));
        DedupKey(hasher.finalize().into())
    }
}

impl fmt::Debug for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// 载荷的规范化内容哈希
pub(crate) fn content_hash(value: &Value) -> [u8; 32] {
    let mut hasher = Sha256::new();
    write_value(&mut hasher, value);
    hasher.finalize().into()
}

fn write_value(h: &mut Sha256, value: &Value) {
    match value {
        Value::Null => h.update(b"z"),
        Value::Bool(true) => h.update(b"t"),
        Value::Bool(false) => h.update(b"f"),
        Value::Number(n) => {
            h.update(b"n");
            write_bytes(h, n.to_string().as_bytes());
        }
        Value::String(s) => {
            h.update(b"s");
            write_bytes(h, s.as_bytes());
        }
        Value::Array(items) => {
            h.update(b"a");
            h.update((items.len() as u64).to_le_bytes());
            for item in items {
                write_value(h, item);
            }
        }
        Value::Object(map) => {
            h.update(b"o");
            h.update((map.len() as u64).to_le_bytes());
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            for (k, v) in entries {
                write_bytes(h, k.as_bytes());
                write_value(h, v);
            }
        }
    }
}

fn write_bytes(h: &mut Sha256, bytes: &[u8]) {
    h.update((bytes.len() as u64).to_le_bytes());
    h.update(bytes);
}

fn write_id(h: &mut Sha256, id: Option<i64>) {
    match id {
        None => h.update([0u8]),
        Some(v) => {
            h.update([1u8]);
            h.update(v.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(data: Value) -> Event {
        Event::builder()
            .event_type("task.completed")
            .source_agent_id(1)
            .circle_id(1)
            .data(data)
            .build()
    }

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"x":[1,2],"y":null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"y":null,"x":[1,2]},"a":1}"#).unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_eq!(DedupKey::of(&event(a)), DedupKey::of(&event(b)));
    }

    #[test]
    fn array_order_and_value_types_matter() {
        assert_ne!(content_hash(&json!([1, 2])), content_hash(&json!([2, 1])));
        assert_ne!(content_hash(&json!({"v": "1"})), content_hash(&json!({"v": 1})));
        assert_ne!(content_hash(&json!({"v": null})), content_hash(&json!({})));
        assert_ne!(
            content_hash(&json!(["ab", "c"])),
            content_hash(&json!(["a", "bc"]))
        );
    }

    #[test]
    fn identity_fields_are_part_of_the_key() {
        let base = event(json!({"action": "save"}));
        let other_source = Event::builder()
            .event_type("task.completed")
            .source_agent_id(2)
            .circle_id(1)
            .data(json!({"action": "save"}))
            .build();
        let no_circle = Event::builder()
            .event_type("task.completed")
            .source_agent_id(1)
            .data(json!({"action": "save"}))
            .build();
        let other_type = Event::builder()
            .event_type("task.failed")
            .source_agent_id(1)
            .circle_id(1)
            .data(json!({"action": "save"}))
            .build();

        let key = DedupKey::of(&base);
        assert_ne!(key, DedupKey::of(&other_source));
        assert_ne!(key, DedupKey::of(&no_circle));
        assert_ne!(key, DedupKey::of(&other_type));
        assert_eq!(key, DedupKey::of(&event(json!({"action": "save"}))));
    }
}
