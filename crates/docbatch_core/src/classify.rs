use std::fmt;

/// Literal every valid item identifier starts with.
pub const ITEM_ID_PREFIX: &str = "500";

/// A trimmed identifier that passed classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Valid(ItemId),
    Invalid,
}

/// Classify a raw cell value. Valid iff the trimmed value starts with [`ITEM_ID_PREFIX`].
pub fn classify(raw: &str) -> Classification {
    let trimmed = raw.trim();
    if trimmed.starts_with(ITEM_ID_PREFIX) {
        Classification::Valid(ItemId(trimmed.to_string()))
    } else {
        Classification::Invalid
    }
}
