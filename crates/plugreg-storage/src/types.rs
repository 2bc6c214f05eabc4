//! Record types for the remote store abstraction.
//!
//! Records are untyped attribute bags keyed by logical attribute names, the
//! same way the platform exposes them. Lookup attributes hold the referenced
//! record's id as a string under the lookup's logical name (for example
//! `pluginassemblyid` on a plugin type); backends translate that convention to
//! their own wire format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Attribute bag sent to or read from the store.
pub type Attributes = serde_json::Map<String, Value>;

/// Globally unique identifier of a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim_matches(|c| c == '{' || c == '}')).map(Self)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Record kinds the registration engine reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    PluginAssembly,
    PluginType,
    Step,
    StepImage,
    SdkMessage,
    SdkMessageFilter,
    SystemUser,
}

/// A lookup attribute: the logical name used in [`Attributes`], the
/// navigation property used when binding it, and the kind it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupField {
    pub attribute: &'static str,
    pub navigation: &'static str,
    pub target: RecordKind,
}

const PLUGIN_TYPE_LOOKUPS: &[LookupField] = &[LookupField {
    attribute: "pluginassemblyid",
    navigation: "pluginassemblyid",
    target: RecordKind::PluginAssembly,
}];

const STEP_LOOKUPS: &[LookupField] = &[
    LookupField {
        attribute: "plugintypeid",
        navigation: "eventhandler_plugintype",
        target: RecordKind::PluginType,
    },
    LookupField {
        attribute: "sdkmessageid",
        navigation: "sdkmessageid",
        target: RecordKind::SdkMessage,
    },
    LookupField {
        attribute: "sdkmessagefilterid",
        navigation: "sdkmessagefilterid",
        target: RecordKind::SdkMessageFilter,
    },
    LookupField {
        attribute: "impersonatinguserid",
        navigation: "impersonatinguserid",
        target: RecordKind::SystemUser,
    },
];

const STEP_IMAGE_LOOKUPS: &[LookupField] = &[LookupField {
    attribute: "sdkmessageprocessingstepid",
    navigation: "sdkmessageprocessingstepid",
    target: RecordKind::Step,
}];

const SDK_MESSAGE_FILTER_LOOKUPS: &[LookupField] = &[LookupField {
    attribute: "sdkmessageid",
    navigation: "sdkmessageid",
    target: RecordKind::SdkMessage,
}];

impl RecordKind {
    /// Logical (schema) name of the platform table.
    #[must_use]
    pub const fn logical_name(self) -> &'static str {
        match self {
            Self::PluginAssembly => "pluginassembly",
            Self::PluginType => "plugintype",
            Self::Step => "sdkmessageprocessingstep",
            Self::StepImage => "sdkmessageprocessingstepimage",
            Self::SdkMessage => "sdkmessage",
            Self::SdkMessageFilter => "sdkmessagefilter",
            Self::SystemUser => "systemuser",
        }
    }

    /// Entity set name used in Web API URLs.
    #[must_use]
    pub const fn entity_set(self) -> &'static str {
        match self {
            Self::PluginAssembly => "pluginassemblies",
            Self::PluginType => "plugintypes",
            Self::Step => "sdkmessageprocessingsteps",
            Self::StepImage => "sdkmessageprocessingstepimages",
            Self::SdkMessage => "sdkmessages",
            Self::SdkMessageFilter => "sdkmessagefilters",
            Self::SystemUser => "systemusers",
        }
    }

    /// Name of the primary key attribute.
    #[must_use]
    pub const fn primary_id(self) -> &'static str {
        match self {
            Self::PluginAssembly => "pluginassemblyid",
            Self::PluginType => "plugintypeid",
            Self::Step => "sdkmessageprocessingstepid",
            Self::StepImage => "sdkmessageprocessingstepimageid",
            Self::SdkMessage => "sdkmessageid",
            Self::SdkMessageFilter => "sdkmessagefilterid",
            Self::SystemUser => "systemuserid",
        }
    }

    /// Solution component type code, for kinds that can be added to a solution.
    #[must_use]
    pub const fn solution_component_type(self) -> Option<i32> {
        match self {
            Self::PluginType => Some(90),
            Self::PluginAssembly => Some(91),
            Self::Step => Some(92),
            Self::StepImage => Some(93),
            Self::SdkMessage | Self::SdkMessageFilter | Self::SystemUser => None,
        }
    }

    #[must_use]
    pub const fn lookups(self) -> &'static [LookupField] {
        match self {
            Self::PluginType => PLUGIN_TYPE_LOOKUPS,
            Self::Step => STEP_LOOKUPS,
            Self::StepImage => STEP_IMAGE_LOOKUPS,
            Self::SdkMessageFilter => SDK_MESSAGE_FILTER_LOOKUPS,
            Self::PluginAssembly | Self::SdkMessage | Self::SystemUser => &[],
        }
    }

    /// Finds the lookup definition for a logical attribute name.
    #[must_use]
    pub fn lookup(self, attribute: &str) -> Option<&'static LookupField> {
        self.lookups().iter().find(|l| l.attribute == attribute)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.logical_name())
    }
}

/// A record as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: RecordKind,
    pub id: RecordId,
    pub attributes: Attributes,
}

impl Record {
    #[must_use]
    pub fn new(kind: RecordKind, id: RecordId, attributes: Attributes) -> Self {
        Self {
            kind,
            id,
            attributes,
        }
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn get_str(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_i64(&self, attribute: &str) -> Option<i64> {
        self.get(attribute).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn get_bool(&self, attribute: &str) -> Option<bool> {
        self.get(attribute).and_then(Value::as_bool)
    }

    /// Reads a lookup attribute as a record id.
    #[must_use]
    pub fn get_id(&self, attribute: &str) -> Option<RecordId> {
        self.get_str(attribute).and_then(|s| s.parse().ok())
    }
}

/// An equality condition on one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub value: Value,
}

impl Condition {
    /// Returns true if the given record satisfies this condition.
    ///
    /// String comparison is case-insensitive, as it is on the platform.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match (attributes.get(&self.attribute), &self.value) {
            (Some(Value::String(actual)), Value::String(expected)) => {
                actual.eq_ignore_ascii_case(expected)
            }
            (Some(actual), expected) => actual == expected,
            (None, Value::Null) => true,
            (None, _) => false,
        }
    }
}

/// Filtered retrieval of one record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub kind: RecordKind,
    pub conditions: Vec<Condition>,
    /// Attributes to return; `None` returns every attribute.
    pub columns: Option<Vec<String>>,
    pub top: Option<u32>,
}

impl Query {
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
            columns: None,
            top: None,
        }
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn with_eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    /// Adds an equality condition on a lookup attribute.
    #[must_use]
    pub fn with_lookup(self, attribute: impl Into<String>, id: RecordId) -> Self {
        self.with_eq(attribute, id.to_string())
    }

    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Returns true if the attributes satisfy every condition.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.conditions.iter().all(|c| c.matches(attributes))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        let mut first = true;
        for condition in &self.conditions {
            let sep = if first { "?" } else { "&" };
            first = false;
            match &condition.value {
                Value::String(s) => write!(f, "{sep}{}={s}", condition.attribute)?,
                other => write!(f, "{sep}{}={other}", condition.attribute)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_id_parse_with_braces() {
        let id: RecordId = "{6f9619ff-8b86-d011-b42d-00c04fc964ff}".parse().unwrap();
        assert_eq!(id.to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    }

    #[test]
    fn test_query_matches_case_insensitive_strings() {
        let query = Query::new(RecordKind::SdkMessage).with_eq("name", "Update");
        assert!(query.matches(&attrs(json!({"name": "update"}))));
        assert!(!query.matches(&attrs(json!({"name": "Create"}))));
        assert!(!query.matches(&attrs(json!({}))));
    }

    #[test]
    fn test_query_matches_numbers() {
        let query = Query::new(RecordKind::Step)
            .with_eq("stage", 40)
            .with_eq("mode", 0);
        assert!(query.matches(&attrs(json!({"stage": 40, "mode": 0}))));
        assert!(!query.matches(&attrs(json!({"stage": 20, "mode": 0}))));
    }

    #[test]
    fn test_query_display() {
        let id = RecordId::new();
        let query = Query::new(RecordKind::PluginType)
            .with_lookup("pluginassemblyid", id)
            .with_eq("typename", "A.B");
        assert_eq!(
            query.to_string(),
            format!("plugintype?pluginassemblyid={id}&typename=A.B")
        );
    }

    #[test]
    fn test_record_accessors() {
        let id = RecordId::new();
        let record = Record::new(
            RecordKind::PluginType,
            RecordId::new(),
            attrs(json!({
                "name": "T",
                "isworkflowactivity": false,
                "pluginassemblyid": id.to_string(),
                "description": null
            })),
        );
        assert_eq!(record.get_str("name"), Some("T"));
        assert_eq!(record.get_bool("isworkflowactivity"), Some(false));
        assert_eq!(record.get_id("pluginassemblyid"), Some(id));
        assert!(record.get("description").is_none());
    }

    #[test]
    fn test_kind_metadata() {
        assert_eq!(RecordKind::Step.entity_set(), "sdkmessageprocessingsteps");
        assert_eq!(RecordKind::StepImage.solution_component_type(), Some(93));
        assert_eq!(RecordKind::SdkMessage.solution_component_type(), None);
        let lookup = RecordKind::Step.lookup("plugintypeid").unwrap();
        assert_eq!(lookup.navigation, "eventhandler_plugintype");
        assert_eq!(lookup.target, RecordKind::PluginType);
    }
}
