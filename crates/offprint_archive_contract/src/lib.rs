use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

pub const CONTRACT_ID: &str = "offprint.archive_contract";
pub const CONTRACT_VERSION: &str = "1";

/// One field of the archive record, as pinned by this contract version.
/// Verifiers compare stored records against this table, so any change here
/// is a contract version bump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordFieldDef {
    pub key: &'static str,
    pub kind: &'static str,
    pub required: bool,
}

pub const RECORD_FIELDS_V1: [RecordFieldDef; 8] = [
    RecordFieldDef { key: "contract", kind: "string", required: true },
    RecordFieldDef { key: "kind_code", kind: "string", required: true },
    RecordFieldDef { key: "unit", kind: "string", required: true },
    RecordFieldDef { key: "topics", kind: "string_array", required: true },
    RecordFieldDef { key: "max_points", kind: "integer", required: true },
    RecordFieldDef { key: "generated_at_ms", kind: "integer", required: true },
    RecordFieldDef { key: "page_count", kind: "integer", required: true },
    RecordFieldDef { key: "pdf_sha256", kind: "string", required: true },
];

/// Metadata stored next to every archived export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub kind_code: String,
    pub unit: String,
    pub topics: Vec<String>,
    pub max_points: u32,
    pub generated_at_ms: u64,
    pub page_count: u64,
    pub pdf_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    pub message: String,
}

impl std::fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "archive contract violation: {}", self.message)
    }
}

impl std::error::Error for ContractViolation {}

fn violation(message: impl Into<String>) -> ContractViolation {
    ContractViolation {
        message: message.into(),
    }
}

pub fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

static CONTRACT_FINGERPRINT: OnceLock<String> = OnceLock::new();

/// Fingerprint of the contract itself: id, version, and the pinned field
/// table. Stable across processes and releases for a given contract version.
pub fn contract_fingerprint_sha256() -> String {
    CONTRACT_FINGERPRINT
        .get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(CONTRACT_ID.as_bytes());
            hasher.update(b"\n");
            hasher.update(CONTRACT_VERSION.as_bytes());
            for field in RECORD_FIELDS_V1 {
                hasher.update(b"\n");
                hasher.update(field.key.as_bytes());
                hasher.update(b":");
                hasher.update(field.kind.as_bytes());
                hasher.update(b":");
                hasher.update(if field.required { b"1" } else { b"0" });
            }
            let digest = hasher.finalize();
            let mut out = String::with_capacity(digest.len() * 2);
            for b in digest {
                use std::fmt::Write;
                let _ = write!(&mut out, "{:02x}", b);
            }
            out
        })
        .clone()
}

pub fn record_field_def(key: &str) -> Option<&'static RecordFieldDef> {
    RECORD_FIELDS_V1.iter().find(|f| f.key == key)
}

impl ArchiveRecord {
    /// JSON form of the record, including the `contract` tag that names the
    /// contract id and version the record was written under.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "contract".to_string(),
            Value::String(format!("{CONTRACT_ID}.v{CONTRACT_VERSION}")),
        );
        map.insert(
            "kind_code".to_string(),
            Value::String(self.kind_code.clone()),
        );
        map.insert("unit".to_string(), Value::String(self.unit.clone()));
        map.insert(
            "topics".to_string(),
            Value::Array(
                self.topics
                    .iter()
                    .map(|t| Value::String(t.clone()))
                    .collect(),
            ),
        );
        map.insert(
            "max_points".to_string(),
            Value::Number(self.max_points.into()),
        );
        map.insert(
            "generated_at_ms".to_string(),
            Value::Number(self.generated_at_ms.into()),
        );
        map.insert(
            "page_count".to_string(),
            Value::Number(self.page_count.into()),
        );
        map.insert(
            "pdf_sha256".to_string(),
            Value::String(self.pdf_sha256.clone()),
        );
        Value::Object(map)
    }

    /// Canonical byte encoding: serde_json's default map serialization sorts
    /// keys, so the same record always encodes to the same bytes.
    pub fn canonical_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn fingerprint_sha256(&self) -> String {
        hex_sha256(self.canonical_json().as_bytes())
    }

    pub fn from_value(value: &Value) -> Result<ArchiveRecord, ContractViolation> {
        let obj = value
            .as_object()
            .ok_or_else(|| violation("record is not a JSON object"))?;

        for field in RECORD_FIELDS_V1 {
            if field.required && !obj.contains_key(field.key) {
                return Err(violation(format!("missing required field {}", field.key)));
            }
        }

        let tag = require_str(obj, "contract")?;
        let expected_tag = format!("{CONTRACT_ID}.v{CONTRACT_VERSION}");
        if tag != expected_tag {
            return Err(violation(format!(
                "contract tag {tag} does not match {expected_tag}"
            )));
        }

        let topics_raw = obj
            .get("topics")
            .and_then(Value::as_array)
            .ok_or_else(|| violation("topics is not an array"))?;
        let mut topics = Vec::with_capacity(topics_raw.len());
        for entry in topics_raw {
            match entry.as_str() {
                Some(s) => topics.push(s.to_string()),
                None => return Err(violation("topics contains a non-string entry")),
            }
        }

        Ok(ArchiveRecord {
            kind_code: require_str(obj, "kind_code")?.to_string(),
            unit: require_str(obj, "unit")?.to_string(),
            topics,
            max_points: require_u64(obj, "max_points")?
                .try_into()
                .map_err(|_| violation("max_points out of range"))?,
            generated_at_ms: require_u64(obj, "generated_at_ms")?,
            page_count: require_u64(obj, "page_count")?,
            pdf_sha256: require_str(obj, "pdf_sha256")?.to_string(),
        })
    }
}

fn require_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, ContractViolation> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| violation(format!("{key} is not a string")))
}

fn require_u64(obj: &Map<String, Value>, key: &str) -> Result<u64, ContractViolation> {
    obj.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| violation(format!("{key} is not an unsigned integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ArchiveRecord {
        ArchiveRecord {
            kind_code: "MR".to_string(),
            unit: "Unit 2".to_string(),
            topics: vec!["2.1".to_string(), "2.10".to_string()],
            max_points: 10,
            generated_at_ms: 1_735_689_600_000,
            page_count: 5,
            pdf_sha256: hex_sha256(b"%PDF-1.4"),
        }
    }

    #[test]
    fn contract_fingerprint_is_stable_and_nonempty() {
        let a = contract_fingerprint_sha256();
        let b = contract_fingerprint_sha256();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = sample_record();
        let restored = ArchiveRecord::from_value(&record.to_value()).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn canonical_encoding_is_key_sorted_and_stable() {
        let record = sample_record();
        let a = record.canonical_json();
        let b = record.canonical_json();
        assert_eq!(a, b);
        let contract_pos = a.find("\"contract\"").unwrap();
        let topics_pos = a.find("\"topics\"").unwrap();
        let unit_pos = a.find("\"unit\"").unwrap();
        assert!(contract_pos < topics_pos && topics_pos < unit_pos);
        assert_eq!(record.fingerprint_sha256().len(), 64);
    }

    #[test]
    fn from_value_rejects_missing_and_mistyped_fields() {
        let record = sample_record();

        let mut missing = record.to_value();
        missing.as_object_mut().unwrap().remove("pdf_sha256");
        let err = ArchiveRecord::from_value(&missing).unwrap_err();
        assert!(err.message.contains("pdf_sha256"));

        let mut mistyped = record.to_value();
        mistyped
            .as_object_mut()
            .unwrap()
            .insert("max_points".to_string(), Value::String("ten".to_string()));
        assert!(ArchiveRecord::from_value(&mistyped).is_err());

        let mut wrong_tag = record.to_value();
        wrong_tag.as_object_mut().unwrap().insert(
            "contract".to_string(),
            Value::String("other.contract.v9".to_string()),
        );
        assert!(ArchiveRecord::from_value(&wrong_tag).is_err());
    }

    #[test]
    fn field_table_lookup_matches_pinned_defs() {
        let topics = record_field_def("topics").unwrap();
        assert_eq!(topics.kind, "string_array");
        assert!(topics.required);
        assert!(record_field_def("unknown_field").is_none());
    }
}
