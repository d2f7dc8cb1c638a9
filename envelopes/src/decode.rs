//! Schema validation engine
//!
//! Every record in the contract is decoded from an untyped `serde_json::Value`
//! by walking it field by field. Leaf values (strings, numbers, enums,
//! timestamps, paths) are still converted by serde; this module adds what
//! serde cannot: a field-path-qualified [`ViolationReport`] that collects
//! *every* problem in one pass instead of stopping at the first.
//!
//! ```text
//! Value ──Fields::open──▶ required / optional / defaulted / record / list
//!                         │                                   │
//!                         └── finish() reports unknown keys ◀─┘
//! ```
//!
//! A decoder returns `None` only after it has pushed at least one violation.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

// ============================================================================
// Field paths
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a document, rendered as
/// `outputs.metrics.site_eui_kwh_m2` or `input_files[0].uri`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// The document root (`$`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Child path for an object key.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        Self(segments)
    }

    /// Child path for an array index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the first segment of this path is the given top-level key.
    pub fn starts_with_key(&self, key: &str) -> bool {
        matches!(self.0.first(), Some(Segment::Key(k)) if k == key)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Numeric bounds
// ============================================================================

/// Declarative numeric constraint attached to a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// `value >= min`
    AtLeast(f64),
    /// `value > min`
    GreaterThan(f64),
    /// `min <= value <= max`
    Between(f64, f64),
}

impl Bound {
    pub const NON_NEGATIVE: Bound = Bound::AtLeast(0.0);
    pub const POSITIVE: Bound = Bound::GreaterThan(0.0);

    pub fn admits(&self, value: f64) -> bool {
        match *self {
            Bound::AtLeast(min) => value >= min,
            Bound::GreaterThan(min) => value > min,
            Bound::Between(min, max) => value >= min && value <= max,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::AtLeast(min) => write!(f, ">= {}", min),
            Bound::GreaterThan(min) => write!(f, "> {}", min),
            Bound::Between(min, max) => write!(f, "between {} and {} inclusive", min, max),
        }
    }
}

/// Numeric leaf types that can be checked against a [`Bound`].
pub trait Numeric: Copy + DeserializeOwned {
    const EXPECTED: &'static str;

    fn as_f64(self) -> f64;
}

impl Numeric for f64 {
    const EXPECTED: &'static str = "number";

    fn as_f64(self) -> f64 {
        self
    }
}

impl Numeric for i64 {
    const EXPECTED: &'static str = "integer";

    fn as_f64(self) -> f64 {
        self as f64
    }
}

// ============================================================================
// Violations
// ============================================================================

/// Why a field was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// Required field absent.
    Missing,
    /// Present but of the wrong JSON type.
    WrongType { expected: &'static str },
    /// Number outside its declared range.
    OutOfRange { bound: Bound, got: f64 },
    /// Key not declared by the record's schema.
    UnknownField,
    /// String not in the closed set of enum values.
    InvalidEnum {
        allowed: &'static [&'static str],
        got: String,
    },
    /// Fixed literal (schema version) with a different value.
    InvalidLiteral { expected: &'static str, got: String },
    /// Any other value-level constraint.
    InvalidValue { reason: String },
}

impl ViolationKind {
    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::WrongType { .. } => "wrong_type",
            Self::OutOfRange { .. } => "out_of_range",
            Self::UnknownField => "unknown_field",
            Self::InvalidEnum { .. } => "invalid_enum",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::InvalidValue { .. } => "invalid_value",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "field required"),
            Self::WrongType { expected } => write!(f, "expected {}", expected),
            Self::OutOfRange { bound, got } => write!(f, "must be {}, got {}", bound, got),
            Self::UnknownField => write!(f, "unknown field"),
            Self::InvalidEnum { allowed, got } => {
                write!(f, "'{}' is not one of [{}]", got, allowed.join(", "))
            }
            Self::InvalidLiteral { expected, got } => {
                write!(f, "expected literal '{}', got '{}'", expected, got)
            }
            Self::InvalidValue { reason } => write!(f, "{}", reason),
        }
    }
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: FieldPath, kind: ViolationKind) -> Self {
        Self { path, kind }
    }

    pub fn reason(&self) -> &'static str {
        self.kind.reason()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Violation", 3)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("reason", self.reason())?;
        state.serialize_field("detail", &self.kind.to_string())?;
        state.end()
    }
}

/// Every violation found while decoding one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ViolationReport(Vec<Violation>);

impl ViolationReport {
    pub fn push(&mut self, path: FieldPath, kind: ViolationKind) {
        self.0.push(Violation::new(path, kind));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn extend(&mut self, other: ViolationReport) {
        self.0.extend(other.0);
    }

    /// First violation recorded at exactly `path` (as rendered).
    pub fn at(&self, path: &str) -> Option<&Violation> {
        self.0.iter().find(|v| v.path.to_string() == path)
    }

    /// Split into (violations under `key`, everything else).
    pub fn partition_by_key(self, key: &str) -> (ViolationReport, ViolationReport) {
        let (inside, outside): (Vec<_>, Vec<_>) =
            self.0.into_iter().partition(|v| v.path.starts_with_key(key));
        (ViolationReport(inside), ViolationReport(outside))
    }

    pub fn into_vec(self) -> Vec<Violation> {
        self.0
    }
}

impl From<Vec<Violation>> for ViolationReport {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl fmt::Display for ViolationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "violation" } else { "violations" };
        write!(f, "{} {}", self.0.len(), noun)?;
        for violation in &self.0 {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ViolationReport {}

// ============================================================================
// Decode trait
// ============================================================================

/// A closed-world record decoded from an untyped document.
pub trait Decode: Sized {
    /// Decode `value` located at `path`, pushing every violation into `report`.
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self>;

    /// Decode a whole document rooted at `value`.
    fn decode(value: &Value) -> Result<Self, ViolationReport> {
        let mut report = ViolationReport::default();
        match Self::decode_at(value, &FieldPath::root(), &mut report) {
            Some(decoded) if report.is_empty() => Ok(decoded),
            _ => {
                if report.is_empty() {
                    report.push(
                        FieldPath::root(),
                        ViolationKind::InvalidValue {
                            reason: "document rejected".to_string(),
                        },
                    );
                }
                Err(report)
            }
        }
    }

    /// Re-run the decoder over a programmatically built value so that
    /// constraints apply identically to constructed and parsed records.
    fn checked(self) -> Result<Self, ViolationReport>
    where
        Self: Serialize,
    {
        let value = serde_json::to_value(&self).map_err(|e| {
            ViolationReport(vec![Violation::new(
                FieldPath::root(),
                ViolationKind::InvalidValue {
                    reason: format!("not encodable: {}", e),
                },
            )])
        })?;
        Self::decode(&value)
    }
}

/// Closed string enum with a known wire vocabulary.
pub trait WireEnum: DeserializeOwned {
    const VARIANTS: &'static [&'static str];
}

impl Decode for Map<String, Value> {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.clone()),
            _ => {
                report.push(path.clone(), ViolationKind::WrongType { expected: "object" });
                None
            }
        }
    }
}

fn leaf<T: DeserializeOwned>(
    value: &Value,
    path: &FieldPath,
    expected: &'static str,
    report: &mut ViolationReport,
) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            report.push(path.clone(), ViolationKind::WrongType { expected });
            None
        }
    }
}

fn enum_leaf<E: WireEnum>(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<E> {
    match E::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            let kind = match value.as_str() {
                Some(got) => ViolationKind::InvalidEnum {
                    allowed: E::VARIANTS,
                    got: got.to_string(),
                },
                None => ViolationKind::WrongType { expected: "string" },
            };
            report.push(path.clone(), kind);
            None
        }
    }
}

// ============================================================================
// Record reader
// ============================================================================

/// Reads the fields of one JSON object, tracking which keys the schema knows.
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: FieldPath,
    known: Vec<&'static str>,
    report: &'a mut ViolationReport,
}

impl<'a> Fields<'a> {
    /// Start reading a record; reports `wrong_type` if `value` is not an object.
    pub fn open(value: &'a Value, path: &FieldPath, report: &'a mut ViolationReport) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                map,
                path: path.clone(),
                known: Vec::new(),
                report,
            }),
            _ => {
                report.push(path.clone(), ViolationKind::WrongType { expected: "object" });
                None
            }
        }
    }

    fn lookup(&mut self, key: &'static str) -> (FieldPath, Option<&'a Value>) {
        self.known.push(key);
        (self.path.key(key), self.map.get(key))
    }

    fn present(&mut self, key: &'static str) -> (FieldPath, Option<&'a Value>) {
        let (path, value) = self.lookup(key);
        (path, value.filter(|v| !v.is_null()))
    }

    // -- Scalars --

    pub fn required<T: DeserializeOwned>(&mut self, key: &'static str, expected: &'static str) -> Option<T> {
        match self.lookup(key) {
            (path, None) => {
                self.report.push(path, ViolationKind::Missing);
                None
            }
            (path, Some(value)) => leaf(value, &path, expected, self.report),
        }
    }

    /// Absent or `null` decodes as `None`.
    pub fn optional<T: DeserializeOwned>(
        &mut self,
        key: &'static str,
        expected: &'static str,
    ) -> Option<Option<T>> {
        match self.present(key) {
            (_, None) => Some(None),
            (path, Some(value)) => leaf(value, &path, expected, self.report).map(Some),
        }
    }

    /// Absent takes `default`; an explicit `null` is a type error.
    pub fn defaulted<T: DeserializeOwned>(
        &mut self,
        key: &'static str,
        expected: &'static str,
        default: impl FnOnce() -> T,
    ) -> Option<T> {
        match self.lookup(key) {
            (_, None) => Some(default()),
            (path, Some(value)) => leaf(value, &path, expected, self.report),
        }
    }

    /// Required string that must not be blank (URIs, identifiers of storage).
    pub fn non_empty(&mut self, key: &'static str) -> Option<String> {
        let value: String = self.required(key, "string")?;
        if value.trim().is_empty() {
            self.reject(key, "must not be empty");
            return None;
        }
        Some(value)
    }

    /// Fixed literal; absent takes the literal.
    pub fn literal(&mut self, key: &'static str, expected: &'static str) -> Option<()> {
        match self.lookup(key) {
            (_, None) => Some(()),
            (_, Some(Value::String(got))) if got == expected => Some(()),
            (path, Some(value)) => {
                let got = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                self.report
                    .push(path, ViolationKind::InvalidLiteral { expected, got });
                None
            }
        }
    }

    // -- Enums --

    pub fn enumerated<E: WireEnum>(&mut self, key: &'static str) -> Option<E> {
        match self.lookup(key) {
            (path, None) => {
                self.report.push(path, ViolationKind::Missing);
                None
            }
            (path, Some(value)) => enum_leaf(value, &path, self.report),
        }
    }

    pub fn enumerated_or<E: WireEnum>(&mut self, key: &'static str, default: E) -> Option<E> {
        match self.lookup(key) {
            (_, None) => Some(default),
            (path, Some(value)) => enum_leaf(value, &path, self.report),
        }
    }

    // -- Numbers --

    pub fn number<N: Numeric>(&mut self, key: &'static str, bound: Option<Bound>) -> Option<N> {
        let value = self.required::<N>(key, N::EXPECTED)?;
        self.bounded(key, value, bound)
    }

    pub fn number_or<N: Numeric>(&mut self, key: &'static str, default: N, bound: Option<Bound>) -> Option<N> {
        let value = self.defaulted::<N>(key, N::EXPECTED, || default)?;
        self.bounded(key, value, bound)
    }

    pub fn optional_number<N: Numeric>(
        &mut self,
        key: &'static str,
        bound: Option<Bound>,
    ) -> Option<Option<N>> {
        match self.optional::<N>(key, N::EXPECTED)? {
            None => Some(None),
            Some(value) => self.bounded(key, value, bound).map(Some),
        }
    }

    fn bounded<N: Numeric>(&mut self, key: &'static str, value: N, bound: Option<Bound>) -> Option<N> {
        match bound {
            Some(bound) if !bound.admits(value.as_f64()) => {
                self.report.push(
                    self.path.key(key),
                    ViolationKind::OutOfRange {
                        bound,
                        got: value.as_f64(),
                    },
                );
                None
            }
            _ => Some(value),
        }
    }

    // -- Nested records --

    pub fn record<T: Decode>(&mut self, key: &'static str) -> Option<T> {
        self.record_or(key, None)
    }

    /// Absent takes `fallback` when one is given, otherwise it is missing.
    pub fn record_or<T: Decode>(&mut self, key: &'static str, fallback: Option<T>) -> Option<T> {
        match self.lookup(key) {
            (path, None) => match fallback {
                Some(value) => Some(value),
                None => {
                    self.report.push(path, ViolationKind::Missing);
                    None
                }
            },
            (path, Some(value)) => T::decode_at(value, &path, self.report),
        }
    }

    pub fn optional_record<T: Decode>(&mut self, key: &'static str) -> Option<Option<T>> {
        match self.present(key) {
            (_, None) => Some(None),
            (path, Some(value)) => T::decode_at(value, &path, self.report).map(Some),
        }
    }

    /// A record slot that a schema may declare nullable or mandatory.
    pub fn nullable_record<T: Decode>(&mut self, key: &'static str, nullable: bool) -> Option<Option<T>> {
        match self.lookup(key) {
            (_, None) | (_, Some(Value::Null)) if nullable => Some(None),
            (path, None) => {
                self.report.push(path, ViolationKind::Missing);
                None
            }
            (path, Some(value)) => T::decode_at(value, &path, self.report).map(Some),
        }
    }

    /// Ordered list of records; absent is an empty list. Every element is
    /// decoded even after a failure so that all violations are collected.
    pub fn list<T: Decode>(&mut self, key: &'static str) -> Option<Vec<T>> {
        let (path, value) = self.lookup(key);
        let items = match value {
            None => return Some(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.report.push(path, ViolationKind::WrongType { expected: "array" });
                return None;
            }
        };
        let mut decoded = Vec::with_capacity(items.len());
        let mut failed = false;
        for (index, item) in items.iter().enumerate() {
            match T::decode_at(item, &path.index(index), self.report) {
                Some(value) => decoded.push(value),
                None => failed = true,
            }
        }
        if failed {
            None
        } else {
            Some(decoded)
        }
    }

    // -- Custom checks --

    /// Record a value-level violation against one of this record's keys.
    pub fn reject(&mut self, key: &str, reason: impl Into<String>) {
        self.report.push(
            self.path.key(key),
            ViolationKind::InvalidValue {
                reason: reason.into(),
            },
        );
    }

    /// Report every key the schema did not read.
    pub fn finish(self) {
        for key in self.map.keys() {
            if !self.known.iter().any(|known| *known == key.as_str()) {
                self.report.push(self.path.key(key), ViolationKind::UnknownField);
            }
        }
    }
}

/// Implement `serde::Deserialize` by routing through [`Decode`], so
/// `serde_json::from_str` applies exactly the same rules.
#[macro_export]
macro_rules! deserialize_via_decode {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'de> ::serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
                where
                    D: ::serde::Deserializer<'de>,
                {
                    let value = <::serde_json::Value as ::serde::Deserialize>::deserialize(deserializer)?;
                    <$ty as $crate::decode::Decode>::decode(&value)
                        .map_err(<D::Error as ::serde::de::Error>::custom)
                }
            }
        )*
    };
}
