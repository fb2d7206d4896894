use serde::Serialize;
use std::collections::HashMap;

/// Closed set of transaction kinds the posting builder knows how to book.
///
/// Raw source labels ("Bought", "BUY", "b") never reach business logic; each
/// adapter supplies a `KindMap` that folds its own vocabulary into this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxnKind {
    Buy,
    Sell,
    Dividend,
    Interest,
    Tax,
    Fee,
    Wire,
    Unknown,
}

impl TxnKind {
    pub fn is_trade(&self) -> bool {
        matches!(self, TxnKind::Buy | TxnKind::Sell)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxnKind::Buy => "Buy",
            TxnKind::Sell => "Sell",
            TxnKind::Dividend => "Dividend",
            TxnKind::Interest => "Interest",
            TxnKind::Tax => "Tax",
            TxnKind::Fee => "Fee",
            TxnKind::Wire => "Wire",
            TxnKind::Unknown => "Unknown",
        }
    }
}

/// Per-adapter lookup table from raw type strings to `TxnKind`.
///
/// Matching is case-insensitive on the trimmed label. Anything not in the
/// table classifies as `Unknown`, which downstream turns into an explicit
/// needs-review transaction rather than a silent drop.
#[derive(Debug, Clone, Default)]
pub struct KindMap {
    entries: HashMap<String, TxnKind>,
}

impl KindMap {
    pub fn new() -> Self {
        KindMap {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, raw: &str, kind: TxnKind) -> Self {
        self.entries.insert(raw.trim().to_lowercase(), kind);
        self
    }

    pub fn classify(&self, raw: &str) -> TxnKind {
        self.entries
            .get(&raw.trim().to_lowercase())
            .copied()
            .unwrap_or(TxnKind::Unknown)
    }
}

impl<'a> FromIterator<(&'a str, TxnKind)> for KindMap {
    fn from_iter<T: IntoIterator<Item = (&'a str, TxnKind)>>(iter: T) -> Self {
        let mut map = KindMap::new();
        for (raw, kind) in iter {
            map = map.with(raw, kind);
        }
        map
    }
}
