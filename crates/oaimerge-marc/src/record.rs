//! Catalog record model: leader plus control fields

use rustc_hash::FxHashMap;

/// Tag of the record identifier control field
pub const TAG_ID: &str = "001";
/// Tag of the physical description fixed field
pub const TAG_CARRIER: &str = "007";
/// Tag of the fixed-length data elements field
pub const TAG_FIXED: &str = "008";

/// Parts of a MARC record the eligibility filter looks at.
///
/// Data fields are not modelled; they travel untouched in the serialized fragment.
#[derive(Debug, Default, Clone)]
pub struct CatalogRecord {
    pub leader: String,
    pub controlfields: FxHashMap<String, String>,
}

impl CatalogRecord {
    pub fn new(leader: impl Into<String>) -> Self {
        Self {
            leader: leader.into(),
            controlfields: FxHashMap::default(),
        }
    }

    /// Builder-style control field setter (tests, benches).
    pub fn with_field(mut self, tag: &str, value: impl Into<String>) -> Self {
        self.controlfields.insert(tag.to_string(), value.into());
        self
    }

    /// Record a control field; the first occurrence of a tag wins.
    pub fn add_controlfield(&mut self, tag: String, value: String) {
        self.controlfields.entry(tag).or_insert(value);
    }

    pub fn field(&self, tag: &str) -> Option<&str> {
        self.controlfields.get(tag).map(String::as_str)
    }

    /// Value of `001`, empty when absent.
    pub fn id(&self) -> &str {
        self.field(TAG_ID).unwrap_or("")
    }
}
