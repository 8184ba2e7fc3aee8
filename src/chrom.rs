//! Chromosome identity and the read-only collaborators that resolve it.
//!
//! The core never constructs a [`Chromosome`] except through a
//! [`ChromosomeLookup`]; unrecognized names yield a synthetic chromosome
//! rather than an error, so the variant factory can always proceed.

use std::collections::HashMap;

/// An opaque chromosome identifier, carrying both its ensembl-style short
/// name (`"1"`, `"X"`, `"MT"`) and its reference-style name (`"chr1"`,
/// `"chrX"`, `"chrM"`).
///
/// Equality is by identity of the two names, not by any numeric index —
/// two lookups of the same textual name are expected to yield
/// value-equal chromosomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Chromosome {
    ensembl_name: String,
    ref_name: String,
}

impl Chromosome {
    pub fn new(ensembl_name: impl Into<String>, ref_name: impl Into<String>) -> Self {
        Self {
            ensembl_name: ensembl_name.into(),
            ref_name: ref_name.into(),
        }
    }

    /// Construct the synthetic "empty" chromosome for an unknown name: both
    /// names are set to the literal input.
    pub fn unknown(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ensembl_name: name.clone(),
            ref_name: name,
        }
    }

    pub fn ensembl_name(&self) -> &str {
        &self.ensembl_name
    }

    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }
}

impl std::fmt::Display for Chromosome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ref_name)
    }
}

/// Read-only query interface resolving a textual chromosome name to a
/// canonical [`Chromosome`]. Never fails; an unrecognized name resolves to
/// [`Chromosome::unknown`].
pub trait ChromosomeLookup {
    fn lookup(&self, name: &str) -> Chromosome;
}

/// Read-only query interface for the global-major allele at a
/// ref-minor site. A miss (no annotation for this site, or the site is not
/// ref-minor) yields `None`.
pub trait RefMinorProvider {
    fn global_major_allele(&self, chrom: &Chromosome, pos: i64) -> Option<String>;
}

/// In-memory [`ChromosomeLookup`] keyed by every alias a caller wants to
/// recognize (e.g. both `"1"` and `"chr1"` mapping to the same
/// [`Chromosome`]). Used by tests and by small embedding callers that don't
/// want to stand up a full reference database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChromosomeLookup {
    by_alias: HashMap<String, Chromosome>,
}

impl InMemoryChromosomeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `aliases` as all resolving to `chrom`.
    pub fn insert(&mut self, chrom: Chromosome, aliases: impl IntoIterator<Item = &'static str>) {
        for alias in aliases {
            self.by_alias.insert(alias.to_string(), chrom.clone());
        }
    }

    /// Build a lookup pre-populated with the 25 canonical human contigs
    /// under both their ensembl-style and `chr`-prefixed names.
    pub fn canonical_grch37() -> Self {
        let mut lookup = Self::new();
        let names = [
            "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
            "17", "18", "19", "20", "21", "22", "X", "Y", "MT",
        ];
        for name in names {
            let ref_name: &'static str = match name {
                "MT" => "chrM",
                other => Box::leak(format!("chr{other}").into_boxed_str()),
            };
            let chrom = Chromosome::new(name, ref_name);
            lookup.insert(chrom.clone(), [name]);
            lookup.insert(chrom, [ref_name]);
        }
        lookup
    }
}

impl ChromosomeLookup for InMemoryChromosomeLookup {
    fn lookup(&self, name: &str) -> Chromosome {
        self.by_alias.get(name).cloned().unwrap_or_else(|| {
            tracing::warn!("unknown chromosome {:?}, using synthetic fallback", name);
            Chromosome::unknown(name)
        })
    }
}

/// In-memory [`RefMinorProvider`] keyed by `(chromosome ref name, position)`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRefMinorProvider {
    by_site: HashMap<(String, i64), String>,
}

impl InMemoryRefMinorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chrom: &Chromosome, pos: i64, global_major_allele: impl Into<String>) {
        self.by_site
            .insert((chrom.ref_name().to_string(), pos), global_major_allele.into());
    }
}

impl RefMinorProvider for InMemoryRefMinorProvider {
    fn global_major_allele(&self, chrom: &Chromosome, pos: i64) -> Option<String> {
        self.by_site.get(&(chrom.ref_name().to_string(), pos)).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_chromosome_carries_literal_name() {
        let chrom = Chromosome::unknown("scaffold_42");
        assert_eq!(chrom.ensembl_name(), "scaffold_42");
        assert_eq!(chrom.ref_name(), "scaffold_42");
    }

    #[test]
    fn in_memory_lookup_resolves_known_aliases() {
        let lookup = InMemoryChromosomeLookup::canonical_grch37();
        let by_short = lookup.lookup("1");
        let by_long = lookup.lookup("chr1");
        assert_eq!(by_short, by_long);
        assert_eq!(by_short.ensembl_name(), "1");
        assert_eq!(by_short.ref_name(), "chr1");
    }

    #[test]
    fn in_memory_lookup_falls_back_to_unknown() {
        let lookup = InMemoryChromosomeLookup::canonical_grch37();
        let chrom = lookup.lookup("chrUn_foo");
        assert_eq!(chrom, Chromosome::unknown("chrUn_foo"));
    }

    #[test]
    fn ref_minor_provider_hit_and_miss() {
        let mut provider = InMemoryRefMinorProvider::new();
        let chrom = Chromosome::new("1", "chr1");
        provider.insert(&chrom, 12345, "G");
        assert_eq!(provider.global_major_allele(&chrom, 12345), Some("G".to_string()));
        assert_eq!(provider.global_major_allele(&chrom, 99), None);
    }
}
