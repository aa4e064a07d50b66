//! Placeholder identity management.
//!
//! Generated items refer to each other through short placeholders such as
//! `EXERCISE_3`. The [`IdentityManager`] keeps a bijection between those
//! placeholders and durable UUIDs for the lifetime of one run, and rewrites
//! whole documents from one namespace to the other.

use crate::error::PipelineError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity families that receive placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceholderKind {
    Equipment,
    Accessory,
    Exercise,
    Workout,
    Set,
    Component,
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 6] = [
        PlaceholderKind::Equipment,
        PlaceholderKind::Accessory,
        PlaceholderKind::Exercise,
        PlaceholderKind::Workout,
        PlaceholderKind::Set,
        PlaceholderKind::Component,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            PlaceholderKind::Equipment => "EQUIPMENT",
            PlaceholderKind::Accessory => "ACCESSORY",
            PlaceholderKind::Exercise => "EXERCISE",
            PlaceholderKind::Workout => "WORKOUT",
            PlaceholderKind::Set => "SET",
            PlaceholderKind::Component => "COMPONENT",
        }
    }
}

impl FromStr for PlaceholderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlaceholderKind::ALL
            .into_iter()
            .find(|kind| kind.prefix() == s)
            .ok_or(())
    }
}

/// A parsed `KIND_N` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub number: u64,
}

impl Placeholder {
    pub fn new(kind: PlaceholderKind, number: u64) -> Self {
        Self { kind, number }
    }

    /// Parse `KIND_N` where `N >= 1` and has no sign or leading zero.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, digits) = raw.rsplit_once('_')?;
        let kind = prefix.parse::<PlaceholderKind>().ok()?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let number = digits.parse::<u64>().ok()?;
        Some(Self { kind, number })
    }

    pub fn is_placeholder(raw: &str) -> bool {
        Self::parse(raw).is_some()
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.number)
    }
}

/// Persistable view of the mapping, placeholder to durable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub entries: BTreeMap<String, String>,
    /// Run namespace that durable ids are derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Uuid>,
}

impl IdentitySnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct IdentityMap {
    namespace: Uuid,
    forward: BTreeMap<String, String>,
    reverse: HashMap<String, String>,
    counters: HashMap<PlaceholderKind, u64>,
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::with_namespace(Uuid::new_v4())
    }
}

impl IdentityMap {
    fn with_namespace(namespace: Uuid) -> Self {
        Self {
            namespace,
            forward: BTreeMap::new(),
            reverse: HashMap::new(),
            counters: HashMap::new(),
        }
    }

    /// Durable id for `key` within this run: v4-shaped, derived from the
    /// namespace so registration order never changes the result.
    fn derive(&self, key: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest.as_bytes()[..16]);
        uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string()
    }

    fn bump_counter(&mut self, placeholder: &Placeholder) {
        let counter = self.counters.entry(placeholder.kind).or_insert(0);
        if placeholder.number > *counter {
            *counter = placeholder.number;
        }
    }

    fn register(&mut self, placeholder: &Placeholder) -> String {
        let key = placeholder.to_string();
        if let Some(existing) = self.forward.get(&key) {
            return existing.clone();
        }
        let durable = self.derive(&key);
        self.bind(placeholder, durable.clone());
        durable
    }

    fn bind(&mut self, placeholder: &Placeholder, durable: String) {
        let key = placeholder.to_string();
        self.reverse.insert(durable.clone(), key.clone());
        self.forward.insert(key, durable);
        self.bump_counter(placeholder);
    }

    fn next(&mut self, kind: PlaceholderKind) -> Placeholder {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        Placeholder::new(kind, *counter)
    }
}

/// Run-scoped bidirectional placeholder to durable-id map.
///
/// Shared by `Arc` across stages; every mutation takes the inner lock.
#[derive(Debug, Default)]
pub struct IdentityManager {
    inner: Mutex<IdentityMap>,
}

impl IdentityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager whose durable ids are derived from `namespace`.
    pub fn with_namespace(namespace: Uuid) -> Self {
        Self {
            inner: Mutex::new(IdentityMap::with_namespace(namespace)),
        }
    }

    /// Durable id for `placeholder`, minting one on first sight.
    pub fn register(&self, placeholder: &str) -> Result<String, PipelineError> {
        let parsed = Placeholder::parse(placeholder)
            .ok_or_else(|| PipelineError::Identity(format!("not a placeholder: {placeholder}")))?;
        Ok(self.inner.lock().register(&parsed))
    }

    /// Bind a caller-supplied durable id to `placeholder`.
    ///
    /// Rebinding the same pair is a no-op; any other conflict is an error.
    pub fn adopt(&self, existing_id: &str, placeholder: &str) -> Result<(), PipelineError> {
        let parsed = Placeholder::parse(placeholder)
            .ok_or_else(|| PipelineError::Identity(format!("not a placeholder: {placeholder}")))?;
        let mut map = self.inner.lock();
        match (map.forward.get(placeholder), map.reverse.get(existing_id)) {
            (Some(bound), _) if bound == existing_id => return Ok(()),
            (Some(bound), _) => {
                return Err(PipelineError::Identity(format!(
                    "{placeholder} is already bound to {bound}"
                )))
            }
            (None, Some(other)) => {
                return Err(PipelineError::Identity(format!(
                    "{existing_id} is already bound to {other}"
                )))
            }
            (None, None) => {}
        }
        map.bind(&parsed, existing_id.to_string());
        Ok(())
    }

    /// Adopt `existing_id` under a freshly minted placeholder of `kind`,
    /// or return the placeholder it already has.
    pub fn adopt_new(&self, kind: PlaceholderKind, existing_id: &str) -> String {
        let mut map = self.inner.lock();
        if let Some(placeholder) = map.reverse.get(existing_id) {
            return placeholder.clone();
        }
        let placeholder = map.next(kind);
        map.bind(&placeholder, existing_id.to_string());
        placeholder.to_string()
    }

    /// Next unused placeholder of `kind`, registered immediately.
    pub fn mint(&self, kind: PlaceholderKind) -> String {
        let mut map = self.inner.lock();
        let placeholder = map.next(kind);
        map.register(&placeholder);
        placeholder.to_string()
    }

    pub fn durable_id(&self, placeholder: &str) -> Option<String> {
        self.inner.lock().forward.get(placeholder).cloned()
    }

    pub fn placeholder_for(&self, durable_id: &str) -> Option<String> {
        self.inner.lock().reverse.get(durable_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite every placeholder string in `document` to its durable id.
    ///
    /// Strings that are not placeholders, including durable ids, pass through.
    pub fn resolve_all(&self, document: &Value) -> Value {
        let mut map = self.inner.lock();
        resolve_value(&mut map, document)
    }

    /// Register every placeholder found in `document` without rewriting it.
    pub fn extract(&self, document: &Value) -> usize {
        let mut found = Vec::new();
        collect_placeholders(document, &mut found);
        let mut map = self.inner.lock();
        let before = map.forward.len();
        for placeholder in &found {
            map.register(placeholder);
        }
        map.forward.len() - before
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        let map = self.inner.lock();
        IdentitySnapshot {
            entries: map.forward.clone(),
            namespace: Some(map.namespace),
        }
    }

    /// Replace the current map with `snapshot`.
    ///
    /// Counters are rebuilt from the highest suffix per kind so later mints
    /// never collide with restored placeholders.
    pub fn restore(&self, snapshot: &IdentitySnapshot) -> Result<(), PipelineError> {
        let mut rebuilt = match snapshot.namespace {
            Some(namespace) => IdentityMap::with_namespace(namespace),
            None => IdentityMap::default(),
        };
        for (placeholder, durable) in &snapshot.entries {
            let parsed = Placeholder::parse(placeholder).ok_or_else(|| {
                PipelineError::Identity(format!("snapshot key is not a placeholder: {placeholder}"))
            })?;
            if let Some(previous) = rebuilt.reverse.get(durable) {
                return Err(PipelineError::Identity(format!(
                    "durable id {durable} bound to both {previous} and {placeholder}"
                )));
            }
            rebuilt.bind(&parsed, durable.clone());
        }
        *self.inner.lock() = rebuilt;
        Ok(())
    }

    pub fn from_snapshot(snapshot: &IdentitySnapshot) -> Result<Self, PipelineError> {
        let manager = Self::new();
        manager.restore(snapshot)?;
        Ok(manager)
    }
}

fn resolve_value(map: &mut IdentityMap, value: &Value) -> Value {
    match value {
        Value::String(raw) => match Placeholder::parse(raw) {
            Some(placeholder) => Value::String(map.register(&placeholder)),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(map, v)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), resolve_value(map, v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn collect_placeholders(value: &Value, out: &mut Vec<Placeholder>) {
    match value {
        Value::String(raw) => {
            if let Some(placeholder) = Placeholder::parse(raw) {
                out.push(placeholder);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, out)),
        Value::Object(fields) => fields.values().for_each(|v| collect_placeholders(v, out)),
        _ => {}
    }
}
