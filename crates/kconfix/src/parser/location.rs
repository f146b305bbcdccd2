use {
    once_cell::sync::OnceCell,
    std::{
        collections::HashMap,
        fmt::{Debug, Display, Formatter, Result as FmtResult},
        hash::{Hash, Hasher},
        ops::Deref,
        path::{Path, PathBuf},
        sync::Mutex,
    },
};

/// Location information for items in a Kconfig file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Location {
    /// The file in which the item is located.
    pub filename: &'static Path,

    /// The line number of the item (1-based).
    pub line: usize,

    /// The column number of the item (1-based).
    pub column: usize,
}

impl Location {
    /// Create a new location from a filename, line number, and column number.
    #[inline(always)]
    pub fn new(filename: impl AsRef<Path>, line: usize, column: usize) -> Self {
        Self {
            filename: cache_path(filename.as_ref()),
            line,
            column,
        }
    }
}

impl Display for Location {
    #[inline(always)]
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}:{}:{}", self.filename.display(), self.line, self.column)
    }
}

/// A trait for items with location information.
pub trait Located {
    /// Get the location of the item.
    fn location(&self) -> Location;
}

/// A [`String`] with location information.
#[derive(Clone)]
pub struct LocString {
    value: String,
    location: Location,
}

impl LocString {
    /// Create a new [`LocString`] from a [`String`] and a [`Location`].
    #[inline(always)]
    pub fn new(value: impl Into<String>, location: Location) -> Self {
        Self {
            value: value.into(),
            location,
        }
    }

    /// Consume this [`LocString`] and return the underlying [`String`].
    #[inline(always)]
    pub fn into_inner(self) -> String {
        self.value
    }
}

impl Deref for LocString {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl Located for LocString {
    #[inline(always)]
    fn location(&self) -> Location {
        self.location
    }
}

impl Debug for LocString {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{:?}", self.value)
    }
}

impl Display for LocString {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&self.value)
    }
}

impl Eq for LocString {}
impl PartialEq for LocString {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialEq<str> for LocString {
    #[inline(always)]
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl Hash for LocString {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

static PATH_CACHE: OnceCell<Mutex<HashMap<PathBuf, &'static Path>>> = OnceCell::new();

/// Return an interned `&'static Path` for the given path.
///
/// [`Location`] values are copied around freely, so paths are leaked once and
/// shared instead of being cloned per token.
pub fn cache_path<P: Into<PathBuf>>(path: P) -> &'static Path {
    let map_mutex = PATH_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let path = path.into();

    let mut map = map_mutex.lock().unwrap();

    if let Some(interned) = map.get(&path) {
        return interned;
    }

    let interned: &'static Path = Box::leak(path.clone().into_boxed_path());
    map.insert(path, interned);
    interned
}

#[cfg(test)]
mod tests {
    use super::{cache_path, Location};

    #[test]
    fn paths_are_interned() {
        let a = cache_path("some/Kconfig");
        let b = cache_path("some/Kconfig");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn location_display() {
        let loc = Location::new("comp/Kconfig", 12, 5);
        assert_eq!(loc.to_string(), "comp/Kconfig:12:5");
    }
}
