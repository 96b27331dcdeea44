use log::debug;
use pricing::{Instrument, InstrumentType};
use std::collections::HashMap;

/// Resolves feed instrument codes against the primary destination's catalog.
///
/// The catalog is partitioned by instrument type. A code is looked up in the EO
/// partition first, then ETO, then AO; the first hit wins. When the catalog lists the
/// same code twice within one type, the first listing is kept.
#[derive(Debug, Clone, Default)]
pub struct InstrumentLookup {
    partitions: HashMap<InstrumentType, HashMap<String, Instrument>>,
}

impl InstrumentLookup {
    pub fn new(catalog: impl IntoIterator<Item = Instrument>) -> Self {
        let mut partitions: HashMap<InstrumentType, HashMap<String, Instrument>> = HashMap::new();
        for instrument in catalog {
            let partition = partitions.entry(instrument.instrument_type()).or_default();
            if partition.contains_key(instrument.code()) {
                debug!("Ignoring duplicate catalog entry {}", instrument);
                continue;
            }
            partition.insert(instrument.code().to_string(), instrument);
        }
        Self { partitions }
    }

    pub fn lookup(&self, code: &str) -> Option<&Instrument> {
        InstrumentType::LOOKUP_ORDER
            .iter()
            .filter_map(|t| self.partitions.get(t))
            .find_map(|partition| partition.get(code))
    }

    /// Number of distinct (type, code) entries.
    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
