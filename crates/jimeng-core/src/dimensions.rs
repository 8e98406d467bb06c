use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

const DIMENSIONS_JSON: &str = include_str!("../data/dimensions.json");

pub const KNOWN_RATIOS: &[&str] = &[
    "1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3", "21:9", "9:21",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// model id -> ratio -> pixel size.
pub type DimensionTable = BTreeMap<String, BTreeMap<String, Dimensions>>;

static TABLE: LazyLock<DimensionTable> = LazyLock::new(|| {
    serde_json::from_str(DIMENSIONS_JSON)
        .unwrap_or_else(|err| panic!("bundled dimensions.json is invalid: {err}"))
});

pub fn table() -> &'static DimensionTable {
    &TABLE
}

/// Unknown pairs are `None`: the backend picks its own size.
pub fn lookup(model: &str, ratio: &str) -> Option<Dimensions> {
    TABLE.get(model)?.get(ratio).copied()
}
