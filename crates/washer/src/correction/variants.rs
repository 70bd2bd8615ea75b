use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{FastMap8, InternalError, Result};

/// The persistent learned-variant map: standard token → sorted variants.
///
/// Stored as a JSON object with alphabetically sorted keys and values so
/// successive runs produce stable files. A variant belongs to exactly one
/// standard, and an entry loaded from disk is never reassigned.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VariantMap {
    standards: BTreeMap<String, BTreeSet<String>>,
}

impl VariantMap {
    /// Loads the map from a JSON file. A missing or corrupt file is not an
    /// error: correction then starts from an empty map.
    pub fn load(path: &Path) -> VariantMap {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                debug!("no variant map at {:?}: {error}", path);
                return VariantMap::default();
            }
        };
        match serde_json::from_reader::<_, BTreeMap<String, BTreeSet<String>>>(file) {
            Ok(standards) => VariantMap { standards },
            Err(error) => {
                warn!("ignoring corrupt variant map {:?}: {error}", path);
                VariantMap::default()
            }
        }
    }

    /// Flattens the map into variant → standard entries, skipping
    /// self-mappings a hand-edited file may contain.
    pub fn variant_to_standard(&self) -> FastMap8<String, String> {
        let mut map = FastMap8::default();
        for (standard, variants) in &self.standards {
            for variant in variants {
                if variant != standard {
                    map.insert(variant.clone(), standard.clone());
                }
            }
        }
        map
    }

    /// Folds newly discovered corrections into the map. Only ASCII-alphabetic
    /// pairs are learned (keeping the file plain ASCII), and a variant already
    /// known under any standard is left where it is. Returns `true` when the
    /// map changed.
    pub fn learn(&mut self, corrections: &FastMap8<String, String>) -> bool {
        let known: BTreeSet<String> =
            self.standards.values().flatten().cloned().collect();
        let mut updated = false;
        for (variant, standard) in corrections {
            if variant == standard {
                continue;
            }
            if !variant.bytes().all(|b| b.is_ascii_alphabetic())
                || !standard.bytes().all(|b| b.is_ascii_alphabetic())
            {
                continue;
            }
            if known.contains(variant) {
                continue;
            }
            if self.standards.entry(standard.clone()).or_default().insert(variant.clone()) {
                updated = true;
            }
        }
        updated
    }

    /// Writes the map atomically: a temporary file in the target directory,
    /// persisted over the destination once fully written.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, &self.standards).map_err(InternalError::from)?;
        file.write_all(b"\n")?;
        file.persist(path).map_err(|error| error.error)?;
        debug!("variant map written to {:?}", path);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.standards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::FastMap8;

    fn corrections(pairs: &[(&str, &str)]) -> FastMap8<String, String> {
        pairs.iter().map(|(v, s)| (v.to_string(), s.to_string())).collect()
    }

    #[test]
    fn learn_never_reassigns_a_variant() {
        let mut map = VariantMap::default();
        assert!(map.learn(&corrections(&[("SMTIH", "SMITH")])));
        // already known under SMITH, must not move under SMYTHE
        assert!(!map.learn(&corrections(&[("SMTIH", "SMYTHE")])));
        let flat = map.variant_to_standard();
        assert_eq!(flat.get("SMTIH"), Some(&S("SMITH")));
    }

    #[test]
    fn learn_skips_non_alphabetic_pairs() {
        let mut map = VariantMap::default();
        assert!(!map.learn(&corrections(&[("123A", "123B"), ("A1", "AB")])));
        assert!(map.is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variants.json");

        let mut map = VariantMap::default();
        map.learn(&corrections(&[("SMTIH", "SMITH"), ("SMYTH", "SMITH"), ("JHON", "JOHN")]));
        map.persist(&path).unwrap();

        let reloaded = VariantMap::load(&path);
        assert_eq!(reloaded, map);

        // keys come back sorted because the file is a sorted JSON object
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.find("JOHN").unwrap() < text.find("SMITH").unwrap());
    }

    #[test]
    fn missing_or_corrupt_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(VariantMap::load(&missing).is_empty());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, b"{ not json").unwrap();
        assert!(VariantMap::load(&corrupt).is_empty());
    }
}
