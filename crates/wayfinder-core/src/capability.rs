use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Specialized execution capability a task can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Quick, low-effort tasks answered without extended reasoning.
    FastTask,
    /// Information gathering and synthesis.
    Research,
    /// Deep reasoning over structured problems.
    Analysis,
    /// Writing, modifying or debugging code.
    Coding,
    /// Open-ended generative writing.
    Creative,
}

impl Capability {
    /// Number of capabilities.
    pub const COUNT: usize = 5;

    /// Every capability, in table order.
    pub const ALL: [Capability; Capability::COUNT] = [
        Capability::FastTask,
        Capability::Research,
        Capability::Analysis,
        Capability::Coding,
        Capability::Creative,
    ];

    /// Position of this capability in a [`CapabilityTable`].
    pub const fn index(self) -> usize {
        match self {
            Capability::FastTask => 0,
            Capability::Research => 1,
            Capability::Analysis => 2,
            Capability::Coding => 3,
            Capability::Creative => 4,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::FastTask => write!(f, "fast_task"),
            Capability::Research => write!(f, "research"),
            Capability::Analysis => write!(f, "analysis"),
            Capability::Coding => write!(f, "coding"),
            Capability::Creative => write!(f, "creative"),
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    /// Accepts `fast_task`, `FAST_TASK`, `fast-task` and friends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Capability::ALL
            .into_iter()
            .find(|cap| cap.to_string() == normalized)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

/// Fixed-size table holding one value per [`Capability`].
///
/// Serialized as a map keyed by capability name. Deserialization requires an
/// entry for every capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapabilityTable<T> {
    values: [T; Capability::COUNT],
}

impl<T> CapabilityTable<T> {
    /// Build a table by evaluating `f` for every capability.
    pub fn from_fn(f: impl FnMut(Capability) -> T) -> Self {
        Self {
            values: Capability::ALL.map(f),
        }
    }

    /// Build a table from values given in [`Capability::ALL`] order.
    pub const fn new(values: [T; Capability::COUNT]) -> Self {
        Self { values }
    }

    /// Iterate `(capability, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, &T)> {
        Capability::ALL.into_iter().zip(self.values.iter())
    }

    /// Iterate `(capability, value)` pairs mutably in table order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Capability, &mut T)> {
        Capability::ALL.into_iter().zip(self.values.iter_mut())
    }

    /// Map every value into a new table.
    pub fn map<U>(&self, mut f: impl FnMut(Capability, &T) -> U) -> CapabilityTable<U> {
        CapabilityTable::from_fn(|cap| f(cap, &self.values[cap.index()]))
    }
}

impl<T: Default> Default for CapabilityTable<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Capability> for CapabilityTable<T> {
    type Output = T;

    fn index(&self, capability: Capability) -> &T {
        &self.values[capability.index()]
    }
}

impl<T> IndexMut<Capability> for CapabilityTable<T> {
    fn index_mut(&mut self, capability: Capability) -> &mut T {
        &mut self.values[capability.index()]
    }
}

impl<T: Serialize> Serialize for CapabilityTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Capability::COUNT))?;
        for (capability, value) in self.iter() {
            map.serialize_entry(&capability, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CapabilityTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut entries: HashMap<Capability, T> = HashMap::deserialize(deserializer)?;
        let mut values = Vec::with_capacity(Capability::COUNT);
        for capability in Capability::ALL {
            let value = entries
                .remove(&capability)
                .ok_or_else(|| D::Error::custom(format!("missing entry for '{capability}'")))?;
            values.push(value);
        }
        let values: [T; Capability::COUNT] = values
            .try_into()
            .map_err(|_| D::Error::custom("capability table has the wrong length"))?;
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, cap) in Capability::ALL.iter().enumerate() {
            assert_eq!(cap.index(), i);
        }
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::FastTask.to_string(), "fast_task");
        assert_eq!(Capability::Coding.to_string(), "coding");
    }

    #[test]
    fn test_capability_from_str_variants() {
        assert_eq!("FAST_TASK".parse::<Capability>(), Ok(Capability::FastTask));
        assert_eq!("fast-task".parse::<Capability>(), Ok(Capability::FastTask));
        assert_eq!(" analysis ".parse::<Capability>(), Ok(Capability::Analysis));
        assert!("painting".parse::<Capability>().is_err());
    }

    #[test]
    fn test_table_index_and_mutation() {
        let mut table = CapabilityTable::from_fn(|cap| cap.index() as u32);
        assert_eq!(table[Capability::Coding], 3);
        table[Capability::Coding] = 10;
        assert_eq!(table[Capability::Coding], 10);
        assert_eq!(table.iter().count(), Capability::COUNT);
    }

    #[test]
    fn test_table_serializes_as_map() {
        let table = CapabilityTable::new([1.0, 2.0, 3.0, 4.0, 5.0]);
        let json = serde_json::to_value(table).unwrap();
        assert_eq!(json["fast_task"], 1.0);
        assert_eq!(json["creative"], 5.0);

        let parsed: CapabilityTable<f64> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_table_rejects_missing_capability() {
        let json = serde_json::json!({ "fast_task": 1.0, "research": 2.0 });
        let parsed: Result<CapabilityTable<f64>, _> = serde_json::from_value(json);
        assert!(parsed.is_err());
    }
}
