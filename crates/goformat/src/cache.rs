use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::tools::ToolName;

/// The base directory of one open project.
///
/// Editors may report virtual or remote roots (ex. `ssh://host/dir`), so this
/// keeps the original text rather than forcing it into a local path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRoot(String);

impl ProjectRoot {
  pub fn new(path: impl Into<String>) -> Self {
    Self(path.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn as_path(&self) -> &Path {
    Path::new(&self.0)
  }

  pub fn is_local(&self) -> bool {
    !self.0.is_empty() && !self.0.contains("://")
  }
}

impl From<&str> for ProjectRoot {
  fn from(path: &str) -> Self {
    Self::new(path)
  }
}

impl From<PathBuf> for ProjectRoot {
  fn from(path: PathBuf) -> Self {
    Self::new(path.to_string_lossy().to_string())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
  pub tool: ToolName,
  /// `None` when the resolution isn't for a specific project.
  pub root: Option<PathBuf>,
}

impl CacheKey {
  pub fn for_root(tool: ToolName, root: impl Into<PathBuf>) -> Self {
    Self { tool, root: Some(root.into()) }
  }

  pub fn bare(tool: ToolName) -> Self {
    Self { tool, root: None }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.root {
      Some(root) => write!(f, "{}:{}", self.tool, root.display()),
      None => write!(f, "{}", self.tool),
    }
  }
}

/// Gets the keys that need resolving for the provided project set.
///
/// Remote roots are skipped. When no local root remains, the tools are
/// resolved under their bare keys so documents outside any project
/// can still be formatted.
pub fn get_resolution_keys(roots: &[ProjectRoot]) -> Vec<CacheKey> {
  let local_roots = roots.iter().filter(|root| root.is_local()).collect::<Vec<_>>();
  if local_roots.is_empty() {
    return ToolName::ALL.into_iter().map(CacheKey::bare).collect();
  }

  let mut keys = Vec::with_capacity(local_roots.len() * ToolName::ALL.len());
  for root in local_roots {
    for tool in ToolName::ALL {
      keys.push(CacheKey::for_root(tool, root.as_path()));
    }
  }
  keys
}

/// Gets the project a file belongs to: the deepest local root containing
/// the file, otherwise the first local root.
pub fn get_project_path(roots: &[ProjectRoot], file_path: Option<&Path>) -> Option<PathBuf> {
  let local_roots = roots.iter().filter(|root| root.is_local());
  let first_root = local_roots.clone().next();
  let containing_root = file_path.and_then(|file_path| {
    local_roots
      .filter(|root| file_path.starts_with(root.as_path()))
      .max_by_key(|root| root.as_path().components().count())
  });
  containing_root.or(first_root).map(|root| root.as_path().to_path_buf())
}

/// Resolved executable paths. This is never mutated once built.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormatterCache {
  entries: IndexMap<CacheKey, String>,
}

impl FormatterCache {
  /// Builds the cache from lookup results, leaving out tools that weren't found.
  pub fn from_resolutions(resolutions: impl IntoIterator<Item = (CacheKey, Option<String>)>) -> Self {
    Self {
      entries: resolutions
        .into_iter()
        .filter_map(|(key, path)| path.filter(|p| !p.is_empty()).map(|path| (key, path)))
        .collect(),
    }
  }

  pub fn get(&self, key: &CacheKey) -> Option<&str> {
    self.entries.get(key).map(|path| path.as_str())
  }

  /// Looks up the tool for the project, falling back to the tool's bare key.
  pub fn lookup(&self, tool: ToolName, project_path: Option<&Path>) -> Option<&str> {
    if let Some(project_path) = project_path {
      if let Some(path) = self.get(&CacheKey::for_root(tool, project_path)) {
        return Some(path);
      }
    }
    self.get(&CacheKey::bare(tool))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &str)> {
    self.entries.iter().map(|(key, path)| (key, path.as_str()))
  }
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn gets_keys_for_each_local_root_and_tool() {
    let roots = vec![ProjectRoot::from("/a"), ProjectRoot::from("ssh://remote/b"), ProjectRoot::from("/c")];
    assert_eq!(
      get_resolution_keys(&roots),
      vec![
        CacheKey::for_root(ToolName::Fmt, "/a"),
        CacheKey::for_root(ToolName::Imports, "/a"),
        CacheKey::for_root(ToolName::Returns, "/a"),
        CacheKey::for_root(ToolName::Fmt, "/c"),
        CacheKey::for_root(ToolName::Imports, "/c"),
        CacheKey::for_root(ToolName::Returns, "/c"),
      ]
    );
  }

  #[test]
  fn gets_bare_keys_without_local_roots() {
    let expected = vec![CacheKey::bare(ToolName::Fmt), CacheKey::bare(ToolName::Imports), CacheKey::bare(ToolName::Returns)];
    assert_eq!(get_resolution_keys(&[]), expected);
    assert_eq!(get_resolution_keys(&[ProjectRoot::from("atom://config")]), expected);
  }

  #[test]
  fn gets_deepest_containing_project() {
    let roots = vec![ProjectRoot::from("/work"), ProjectRoot::from("/work/nested"), ProjectRoot::from("/other")];
    assert_eq!(get_project_path(&roots, Some(Path::new("/work/nested/x.go"))), Some(PathBuf::from("/work/nested")));
    assert_eq!(get_project_path(&roots, Some(Path::new("/other/y.go"))), Some(PathBuf::from("/other")));
    // outside every root or unsaved
    assert_eq!(get_project_path(&roots, Some(Path::new("/tmp/z.go"))), Some(PathBuf::from("/work")));
    assert_eq!(get_project_path(&roots, None), Some(PathBuf::from("/work")));
    assert_eq!(get_project_path(&[], None), None);
    assert_eq!(get_project_path(&[ProjectRoot::from("https://x/y")], None), None);
  }

  #[test]
  fn looks_up_project_key_then_bare_key() {
    let cache = FormatterCache::from_resolutions(vec![
      (CacheKey::for_root(ToolName::Fmt, "/a"), Some("/a/bin/gofmt".to_string())),
      (CacheKey::bare(ToolName::Fmt), Some("/usr/bin/gofmt".to_string())),
      (CacheKey::for_root(ToolName::Imports, "/a"), None),
    ]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.lookup(ToolName::Fmt, Some(Path::new("/a"))), Some("/a/bin/gofmt"));
    assert_eq!(cache.lookup(ToolName::Fmt, Some(Path::new("/b"))), Some("/usr/bin/gofmt"));
    assert_eq!(cache.lookup(ToolName::Fmt, None), Some("/usr/bin/gofmt"));
    assert_eq!(cache.lookup(ToolName::Imports, Some(Path::new("/a"))), None);
  }

  #[test]
  fn displays_keys() {
    assert_eq!(CacheKey::for_root(ToolName::Returns, "/a").to_string(), "goreturns:/a");
    assert_eq!(CacheKey::bare(ToolName::Imports).to_string(), "goimports");
  }
}
