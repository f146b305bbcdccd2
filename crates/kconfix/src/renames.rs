//! Rename maps: `sdkconfig.rename`-style lists of deprecated option names and
//! their replacements.
//!
//! Each non-comment line holds `CONFIG_OLD CONFIG_NEW`. Prefixing the new name
//! with `!` declares a value-inverting rename for bools (n/unset becomes y and
//! back). Renames may chain; chains are collapsed to the newest name and must
//! be acyclic.

use {
    crate::{conf::CONFIG_PREFIX, parser::KconfigError},
    std::{
        collections::{HashMap, HashSet},
        fs,
        path::Path,
    },
};

/// A validated rename map.
#[derive(Debug, Default)]
pub struct RenameMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, Vec<String>>,
    inversions: HashSet<String>,
}

impl RenameMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a rename file.
    pub fn load(path: &Path) -> Result<Self, KconfigError> {
        let text = fs::read_to_string(path)?;
        let mut map = Self::new();
        map.parse(&text, &path.display().to_string())?;
        Ok(map)
    }

    /// Parse rename lines into this map, validating as it goes.
    pub fn parse(&mut self, text: &str, filename: &str) -> Result<(), KconfigError> {
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(old), Some(new), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(KconfigError::rename(
                    format!("{filename}:{}: expected 'CONFIG_OLD CONFIG_NEW'", lineno + 1),
                    None,
                ));
            };

            let inverted = new.starts_with('!');
            let new = new.trim_start_matches('!');

            let (Some(old), Some(new)) = (old.strip_prefix(CONFIG_PREFIX), new.strip_prefix(CONFIG_PREFIX)) else {
                return Err(KconfigError::rename(
                    format!("{filename}:{}: names must be prefixed with {CONFIG_PREFIX}", lineno + 1),
                    None,
                ));
            };

            self.add(old, new, inverted).map_err(|e| {
                KconfigError::rename(format!("{filename}:{}: {}", lineno + 1, e.kind), None)
            })?;
        }

        self.check_cycles()
    }

    /// Add one rename pair. Self-renames and duplicate old names are rejected.
    pub fn add(&mut self, old: &str, new: &str, inverted: bool) -> Result<(), KconfigError> {
        if old == new {
            return Err(KconfigError::rename(format!("{old} is renamed to itself"), None));
        }

        if let Some(existing) = self.forward.get(old) {
            return Err(KconfigError::rename(
                format!("{old} already renamed to {existing}; second target {new}"),
                None,
            ));
        }

        self.forward.insert(old.to_string(), new.to_string());
        self.reverse.entry(new.to_string()).or_default().push(old.to_string());

        if inverted {
            self.inversions.insert(old.to_string());
        }

        Ok(())
    }

    /// Error out if any rename chain loops back on itself.
    pub fn check_cycles(&self) -> Result<(), KconfigError> {
        for start in self.forward.keys() {
            let mut seen = HashSet::new();
            let mut current = start.as_str();

            while let Some(next) = self.forward.get(current) {
                if !seen.insert(current.to_string()) {
                    return Err(KconfigError::rename(format!("rename cycle through {start}"), None));
                }
                current = next;
            }
        }

        Ok(())
    }

    /// Collapse a (possibly chained) old name to its canonical, newest name.
    /// Returns `None` when the name is not renamed.
    pub fn canonical(&self, name: &str) -> Option<String> {
        let mut current = self.forward.get(name)?;
        let mut guard = 0;

        while let Some(next) = self.forward.get(current) {
            current = next;
            guard += 1;
            if guard > self.forward.len() {
                // A cycle that check_cycles would have rejected; stop anyway.
                break;
            }
        }

        Some(current.to_string())
    }

    /// Whether the rename starting at `old` inverts the value.
    ///
    /// For chains, inversions compose: an odd number of inverting hops flips
    /// the value.
    pub fn is_inversion(&self, old: &str) -> bool {
        let mut flips = false;
        let mut current = old;
        let mut guard = 0;

        while let Some(next) = self.forward.get(current) {
            if self.inversions.contains(current) {
                flips = !flips;
            }
            current = next;
            guard += 1;
            if guard > self.forward.len() {
                break;
            }
        }

        flips
    }

    /// Every deprecated name whose *canonical* target is `name`, chains
    /// included, in sorted order.
    pub fn all_deprecated_for(&self, name: &str) -> Vec<String> {
        let mut olds: Vec<String> = self
            .forward
            .keys()
            .filter(|old| self.canonical(old).as_deref() == Some(name))
            .cloned()
            .collect();
        olds.sort();
        olds
    }

    /// Find a deprecated name whose canonical target is `name`, for configs
    /// written with the new name while the Kconfig still uses the old one.
    pub fn reverse_of(&self, name: &str) -> Option<&str> {
        self.reverse.get(name).and_then(|olds| olds.first()).map(String::as_str)
    }

    /// True when the map holds no renames.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterate the direct (uncollapsed) rename pairs as
    /// `(old, new, inverted)`, in arbitrary order.
    pub fn pairs(&self) -> impl Iterator<Item = (String, String, bool)> + '_ {
        self.forward.iter().map(|(old, new)| (old.clone(), new.clone(), self.inversions.contains(old)))
    }
}

#[cfg(test)]
mod tests {
    use super::RenameMap;

    #[test]
    fn chain_of_three_collapses() {
        let mut map = RenameMap::new();
        map.parse("CONFIG_A CONFIG_B\nCONFIG_B CONFIG_C\nCONFIG_C CONFIG_D\n", "r").unwrap();

        assert_eq!(map.canonical("A").as_deref(), Some("D"));
        assert_eq!(map.canonical("B").as_deref(), Some("D"));
        assert_eq!(map.canonical("D"), None);
    }

    #[test]
    fn self_rename_rejected() {
        let mut map = RenameMap::new();
        assert!(map.parse("CONFIG_A CONFIG_A\n", "r").is_err());
    }

    #[test]
    fn cycle_rejected() {
        let mut map = RenameMap::new();
        assert!(map.parse("CONFIG_A CONFIG_B\nCONFIG_B CONFIG_A\n", "r").is_err());
    }

    #[test]
    fn duplicate_old_rejected() {
        let mut map = RenameMap::new();
        assert!(map.parse("CONFIG_A CONFIG_B\nCONFIG_A CONFIG_C\n", "r").is_err());
    }

    #[test]
    fn missing_prefix_rejected() {
        let mut map = RenameMap::new();
        assert!(map.parse("A CONFIG_B\n", "r").is_err());
    }

    #[test]
    fn inversion_tracks_through_chains() {
        let mut map = RenameMap::new();
        map.parse("CONFIG_A !CONFIG_B\nCONFIG_B CONFIG_C\n", "r").unwrap();

        assert!(map.is_inversion("A"));
        assert!(!map.is_inversion("B"));
        assert_eq!(map.all_deprecated_for("C"), ["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let mut map = RenameMap::new();
        map.parse("# header\n\nCONFIG_X CONFIG_Y\n", "r").unwrap();
        assert_eq!(map.canonical("X").as_deref(), Some("Y"));
    }
}
