//! Declarative schema descriptors for an Appwrite database.
//!
//! A [`DatabaseSpec`] owns an ordered list of [`CollectionSpec`]s, each of
//! which owns its attributes and indexes. Descriptors are plain data: they are
//! built once (see [`crate::catalog`]) and handed to the provisioner, which
//! turns each entry into a control-plane call.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Appwrite id rule: alphanumeric first char, then up to 35 of `[a-zA-Z0-9._-]`.
static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,35}$").expect("static id pattern is valid")
});

/// Returns `true` if `id` is acceptable as a collection id, attribute key, or index key.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Operation a permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Create,
    Update,
    Delete,
    Write,
}

impl Capability {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Write => "write",
        }
    }
}

/// Principal a permission is granted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum Role {
    /// Anyone, authenticated or not.
    Any,
    /// Any authenticated user.
    Users,
    /// Unauthenticated visitors only.
    Guests,
    /// One specific user.
    User(String),
    /// Members of one team.
    Team(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Users => f.write_str("users"),
            Self::Guests => f.write_str("guests"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Team(id) => write!(f, "team:{id}"),
        }
    }
}

/// A capability-role pair, rendered on the wire as `read("users")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub capability: Capability,
    pub role: Role,
}

impl Permission {
    #[must_use]
    pub fn new(capability: Capability, role: Role) -> Self {
        Self { capability, role }
    }

    /// Full CRUD for the given role, in the order Appwrite lists them.
    #[must_use]
    pub fn crud(role: &Role) -> Vec<Self> {
        [
            Capability::Create,
            Capability::Read,
            Capability::Update,
            Capability::Delete,
        ]
        .into_iter()
        .map(|capability| Self::new(capability, role.clone()))
        .collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(\"{}\")", self.capability.as_str(), self.role)
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Attribute type together with its type-specific constraints and default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeKind {
    String {
        size: u32,
        default: Option<String>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
        default: Option<i64>,
    },
    Boolean {
        default: Option<bool>,
    },
    Datetime {
        default: Option<String>,
    },
    Enum {
        elements: Vec<String>,
        default: Option<String>,
    },
}

impl AttributeKind {
    /// Route segment Appwrite uses for this attribute type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Integer { .. } => "integer",
            Self::Boolean { .. } => "boolean",
            Self::Datetime { .. } => "datetime",
            Self::Enum { .. } => "enum",
        }
    }

    fn has_default(&self) -> bool {
        match self {
            Self::String { default, .. }
            | Self::Datetime { default }
            | Self::Enum { default, .. } => default.is_some(),
            Self::Integer { default, .. } => default.is_some(),
            Self::Boolean { default } => default.is_some(),
        }
    }

    fn clear_default(&mut self) {
        match self {
            Self::String { default, .. }
            | Self::Datetime { default }
            | Self::Enum { default, .. } => *default = None,
            Self::Integer { default, .. } => *default = None,
            Self::Boolean { default } => *default = None,
        }
    }
}

/// A typed field definition on a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Unique within the owning collection.
    pub key: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
    pub required: bool,
    pub array: bool,
}

impl AttributeSpec {
    fn with_kind(key: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: false,
            array: false,
        }
    }

    #[must_use]
    pub fn string(key: impl Into<String>, size: u32) -> Self {
        Self::with_kind(key, AttributeKind::String { size, default: None })
    }

    #[must_use]
    pub fn integer(key: impl Into<String>) -> Self {
        Self::with_kind(
            key,
            AttributeKind::Integer {
                min: None,
                max: None,
                default: None,
            },
        )
    }

    #[must_use]
    pub fn boolean(key: impl Into<String>) -> Self {
        Self::with_kind(key, AttributeKind::Boolean { default: None })
    }

    #[must_use]
    pub fn datetime(key: impl Into<String>) -> Self {
        Self::with_kind(key, AttributeKind::Datetime { default: None })
    }

    #[must_use]
    pub fn enumeration<I, S>(key: impl Into<String>, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(
            key,
            AttributeKind::Enum {
                elements: elements.into_iter().map(Into::into).collect(),
                default: None,
            },
        )
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Sets inclusive integer bounds. No effect on non-integer attributes.
    #[must_use]
    pub fn range(mut self, lower: i64, upper: i64) -> Self {
        if let AttributeKind::Integer { min, max, .. } = &mut self.kind {
            *min = Some(lower);
            *max = Some(upper);
        }
        self
    }

    /// Sets a string-like default (string, datetime, enum attributes).
    #[must_use]
    pub fn default_str(mut self, value: impl Into<String>) -> Self {
        match &mut self.kind {
            AttributeKind::String { default, .. }
            | AttributeKind::Datetime { default }
            | AttributeKind::Enum { default, .. } => *default = Some(value.into()),
            AttributeKind::Integer { .. } | AttributeKind::Boolean { .. } => {}
        }
        self
    }

    #[must_use]
    pub fn default_int(mut self, value: i64) -> Self {
        if let AttributeKind::Integer { default, .. } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    #[must_use]
    pub fn default_bool(mut self, value: bool) -> Self {
        if let AttributeKind::Boolean { default } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    /// Default value as JSON, or `None` when unset.
    #[must_use]
    pub fn default_value(&self) -> Option<serde_json::Value> {
        match &self.kind {
            AttributeKind::String { default, .. }
            | AttributeKind::Datetime { default }
            | AttributeKind::Enum { default, .. } => {
                default.clone().map(serde_json::Value::String)
            }
            AttributeKind::Integer { default, .. } => default.map(serde_json::Value::from),
            AttributeKind::Boolean { default } => default.map(serde_json::Value::Bool),
        }
    }

    /// Applies the remote store's required-field rule: a required attribute
    /// carries no default. Any default on a required attribute is dropped.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        if out.required && out.kind.has_default() {
            warn!(key = %out.key, "dropping default on required attribute");
            out.kind.clear_default();
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Key,
    Unique,
    Fulltext,
}

impl IndexKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Unique => "unique",
            Self::Fulltext => "fulltext",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Index over one or more attributes of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: IndexKind,
    pub attributes: Vec<String>,
    /// Empty, or one entry per attribute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<SortOrder>,
}

impl IndexSpec {
    fn with_kind<I, S>(key: impl Into<String>, kind: IndexKind, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            kind,
            attributes: attributes.into_iter().map(Into::into).collect(),
            orders: Vec::new(),
        }
    }

    #[must_use]
    pub fn key<I, S>(key: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(key, IndexKind::Key, attributes)
    }

    #[must_use]
    pub fn unique<I, S>(key: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(key, IndexKind::Unique, attributes)
    }

    #[must_use]
    pub fn fulltext<I, S>(key: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(key, IndexKind::Fulltext, attributes)
    }

    #[must_use]
    pub fn orders(mut self, orders: impl Into<Vec<SortOrder>>) -> Self {
        self.orders = orders.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Collections and databases
// ---------------------------------------------------------------------------

/// A schema-bearing container of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub id: String,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub document_security: bool,
    pub enabled: bool,
    pub attributes: Vec<AttributeSpec>,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// New enabled collection with document security on and no permissions.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions: Vec::new(),
            document_security: true,
            enabled: true,
            attributes: Vec::new(),
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Looks up an attribute by key.
    #[must_use]
    pub fn find_attribute(&self, key: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.key == key)
    }

    /// Attribute keys referenced by at least one index, in first-use order.
    #[must_use]
    pub fn indexed_attribute_keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.indexes
            .iter()
            .flat_map(|idx| idx.attributes.iter())
            .filter(|key| seen.insert(key.as_str()))
            .map(String::as_str)
            .collect()
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        let cid = &self.id;
        if !is_valid_id(cid) {
            errors.push(format!("collection id `{cid}` is not a valid id"));
        }

        let mut keys = HashSet::new();
        for attr in &self.attributes {
            let key = &attr.key;
            if !is_valid_id(key) {
                errors.push(format!("{cid}.{key}: attribute key is not a valid id"));
            }
            if !keys.insert(key.as_str()) {
                errors.push(format!("{cid}.{key}: duplicate attribute key"));
            }
            match &attr.kind {
                AttributeKind::String { size, .. } if *size == 0 => {
                    errors.push(format!("{cid}.{key}: string size must be positive"));
                }
                AttributeKind::Integer { min, max, default } => {
                    if let (Some(lo), Some(hi)) = (min, max) {
                        if lo > hi {
                            errors.push(format!("{cid}.{key}: min {lo} exceeds max {hi}"));
                        }
                    }
                    if let Some(d) = default {
                        let below = min.is_some_and(|lo| *d < lo);
                        let above = max.is_some_and(|hi| *d > hi);
                        if below || above {
                            errors.push(format!("{cid}.{key}: default {d} outside range"));
                        }
                    }
                }
                AttributeKind::Enum { elements, default } => {
                    if elements.is_empty() {
                        errors.push(format!("{cid}.{key}: enum has no elements"));
                    }
                    if let Some(d) = default {
                        if !elements.contains(d) {
                            errors.push(format!("{cid}.{key}: default `{d}` is not an element"));
                        }
                    }
                }
                _ => {}
            }
        }

        let mut index_keys = HashSet::new();
        for idx in &self.indexes {
            let key = &idx.key;
            if !is_valid_id(key) {
                errors.push(format!("{cid}/{key}: index key is not a valid id"));
            }
            if !index_keys.insert(key.as_str()) {
                errors.push(format!("{cid}/{key}: duplicate index key"));
            }
            if idx.attributes.is_empty() {
                errors.push(format!("{cid}/{key}: index covers no attributes"));
            }
            for attr in &idx.attributes {
                if !keys.contains(attr.as_str()) {
                    errors.push(format!("{cid}/{key}: unknown attribute `{attr}`"));
                }
            }
            if !idx.orders.is_empty() && idx.orders.len() != idx.attributes.len() {
                errors.push(format!(
                    "{cid}/{key}: {} orders for {} attributes",
                    idx.orders.len(),
                    idx.attributes.len()
                ));
            }
        }
    }
}

/// A database and every collection it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub id: String,
    pub name: String,
    pub collections: Vec<CollectionSpec>,
}

impl DatabaseSpec {
    #[must_use]
    pub fn collection(&self, id: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Checks every structural rule and reports all violations at once.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] listing each violation found.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut errors = Vec::new();
        if !is_valid_id(&self.id) {
            errors.push(format!("database id `{}` is not a valid id", self.id));
        }
        let mut ids = HashSet::new();
        for collection in &self.collections {
            if !ids.insert(collection.id.as_str()) {
                errors.push(format!("duplicate collection id `{}`", collection.id));
            }
            collection.collect_errors(&mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid { errors })
        }
    }
}

/// Structural problems found in a schema descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema has {} problem(s): {}", errors.len(), errors.join("; "))]
    Invalid {
        /// Human-readable description of each violation.
        errors: Vec<String>,
    },
}
