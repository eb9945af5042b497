use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One named sub-balance inside an address portfolio (a DeFi project).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBalance {
    pub name: String,
    /// Display string as read off the page, e.g. `$1,234`.
    pub amount: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: f64,
}

/// The plain-token wallet sub-balance, when the page shows one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub amount: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: f64,
}

/// One address's captured state at a point in time. Immutable once collected.
///
/// `total_balance_usd` is read from a distinct on-page element, so the wallet
/// and project sub-balances are not required to sum to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub address: String,
    #[serde(rename = "totalBalance")]
    pub total_balance: String,
    #[serde(rename = "totalBalanceUSD")]
    pub total_balance_usd: f64,
    pub wallet: Option<WalletBalance>,
    pub projects: Vec<ProjectBalance>,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

/// All addresses' snapshots from one collection run, keyed by address.
///
/// Insertion order is preserved into serialization and comparison output
/// (display order, not correctness), which rules out a plain `HashMap`.
/// Serialized as a JSON object `{ address: snapshot, ... }` for
/// compatibility with the persisted file format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotSet {
    entries: Vec<AddressSnapshot>,
}

impl SnapshotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a snapshot, replacing any existing entry for the same address
    /// in place (original position kept).
    pub fn insert(&mut self, snapshot: AddressSnapshot) {
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|e| e.address == snapshot.address)
        {
            *slot = snapshot;
        } else {
            self.entries.push(snapshot);
        }
    }

    pub fn get(&self, address: &str) -> Option<&AddressSnapshot> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressSnapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregate current total across every address in the set.
    pub fn total_usd(&self) -> f64 {
        self.entries.iter().map(|e| e.total_balance_usd).sum()
    }
}

impl FromIterator<AddressSnapshot> for SnapshotSet {
    fn from_iter<I: IntoIterator<Item = AddressSnapshot>>(iter: I) -> Self {
        let mut set = Self::new();
        for snapshot in iter {
            set.insert(snapshot);
        }
        set
    }
}

impl Serialize for SnapshotSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.address, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SnapshotSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = SnapshotSet;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of address to snapshot")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, mut snapshot)) =
                    access.next_entry::<String, AddressSnapshot>()?
                {
                    // The map key is authoritative for the identity.
                    snapshot.address = key;
                    entries.push(snapshot);
                }
                Ok(SnapshotSet { entries })
            }
        }

        deserializer.deserialize_map(SetVisitor)
    }
}

// ── Comparison report (derived, never persisted) ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectChange {
    pub name: String,
    pub change: f64,
    #[serde(rename = "changePercent")]
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(rename = "totalBalanceChange")]
    pub total_balance_change: f64,
    #[serde(rename = "totalBalanceChangePercent")]
    pub total_balance_change_percent: f64,
    #[serde(rename = "walletChange")]
    pub wallet_change: f64,
    #[serde(rename = "projectChanges")]
    pub project_changes: Vec<ProjectChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressComparison {
    pub address: String,
    pub current: AddressSnapshot,
    pub previous: Option<AddressSnapshot>,
    pub changes: Changes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Generation time of the report itself, independent of snapshot times.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "totalValue")]
    pub total_value: f64,
    #[serde(rename = "totalValueChange")]
    pub total_value_change: f64,
    #[serde(rename = "totalValueChangePercent")]
    pub total_value_change_percent: f64,
    pub addresses: Vec<AddressComparison>,
}

// ── Generic page capture (link-diff variant) ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub text: String,
    pub href: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub title: String,
    pub description: String,
    pub links: Vec<LinkRecord>,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub previous_count: usize,
    pub current_count: usize,
    pub new_count: usize,
    pub removed_count: usize,
    pub modified_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffChanges {
    pub new: Vec<LinkRecord>,
    pub removed: Vec<LinkRecord>,
    pub modified: Vec<LinkRecord>,
}

/// Outcome of diffing two page captures. `Initial` is the first-run shape
/// (no baseline to compare against).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageDiff {
    Initial {
        message: String,
        #[serde(rename = "currentCount")]
        current_count: usize,
    },
    Comparison {
        summary: DiffSummary,
        changes: DiffChanges,
        #[serde(rename = "titleChanged")]
        title_changed: bool,
        #[serde(rename = "descriptionChanged")]
        description_changed: bool,
    },
}
