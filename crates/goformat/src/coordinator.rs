use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::FormatterCache;
use crate::cache::ProjectRoot;
use crate::cache::get_project_path;
use crate::cache::get_resolution_keys;
use crate::configuration::FormatConfig;
use crate::document::Document;
use crate::environment::Environment;
use crate::tools::ToolName;

/// Where a format request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
  /// The document wasn't editable, or formatting on save is disabled.
  Skipped,
  /// No executable could be found, even after rebuilding the cache.
  ToolNotFound,
  /// The tool exited with a non-zero code or couldn't be run.
  Failed,
  /// The tool succeeded and its output matched the document.
  Unchanged,
  Formatted,
}

/// Aborts the listener task when dropped.
struct Subscription(JoinHandle<()>);

impl Drop for Subscription {
  fn drop(&mut self) {
    self.0.abort();
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RebuildResult {
  Rebuilt,
  /// Another rebuild was running.
  InProgress,
  /// A search failed or the coordinator was disposed.
  Aborted,
}

/// Clears the rebuilding flag on every exit path and wakes anyone
/// waiting to rebuild.
struct RebuildGuard<'a> {
  flag: &'a AtomicBool,
  finished: &'a Notify,
}

impl<'a> RebuildGuard<'a> {
  fn acquire(flag: &'a AtomicBool, finished: &'a Notify) -> Option<Self> {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
    Some(Self { flag, finished })
  }
}

impl Drop for RebuildGuard<'_> {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::Release);
    self.finished.notify_waiters();
  }
}

/// Resolves formatter executables per project and applies them to documents.
///
/// Resolutions are held in a [`FormatterCache`] that's swapped out whole
/// whenever it's rebuilt, so readers only ever see a complete cache.
pub struct FormatCoordinator<TEnvironment: Environment> {
  environment: TEnvironment,
  settings: watch::Receiver<FormatConfig>,
  project_roots: RwLock<Vec<ProjectRoot>>,
  tool: RwLock<ToolName>,
  cache: RwLock<Option<Arc<FormatterCache>>>,
  /// The `toolPaths` setting the current cache was built with.
  applied_tool_paths: Mutex<BTreeMap<ToolName, String>>,
  rebuilding: AtomicBool,
  rebuild_finished: Notify,
  disposed: AtomicBool,
  subscriptions: Mutex<Vec<Subscription>>,
}

impl<TEnvironment: Environment> FormatCoordinator<TEnvironment> {
  pub fn new(environment: TEnvironment, settings: watch::Receiver<FormatConfig>, project_roots: Vec<ProjectRoot>) -> Self {
    let tool = settings.borrow().tool;
    FormatCoordinator {
      environment,
      settings,
      project_roots: RwLock::new(project_roots),
      tool: RwLock::new(tool),
      cache: Default::default(),
      applied_tool_paths: Default::default(),
      rebuilding: AtomicBool::new(false),
      rebuild_finished: Notify::new(),
      disposed: AtomicBool::new(false),
      subscriptions: Default::default(),
    }
  }

  /// Rebuilds the cache whenever the project set or the settings change.
  ///
  /// The current project set is adopted immediately. Observing again
  /// replaces the previous listeners. Listening stops on
  /// [`FormatCoordinator::dispose`] or once the coordinator is dropped.
  pub fn observe(self: &Arc<Self>, mut projects: watch::Receiver<Vec<ProjectRoot>>) {
    let mut subscriptions = self.subscriptions.lock();
    if self.disposed.load(Ordering::Acquire) {
      return;
    }

    let project_roots = projects.borrow_and_update().clone();
    let roots_changed = project_roots != self.project_roots();
    if roots_changed {
      self.set_project_roots(project_roots);
    }

    let projects_task = tokio::spawn(listen_for_project_changes(Arc::downgrade(self), projects, roots_changed));
    let settings_task = tokio::spawn(listen_for_settings_changes(Arc::downgrade(self), self.settings.clone()));
    // dropping the previous subscriptions aborts their listeners
    *subscriptions = vec![Subscription(projects_task), Subscription(settings_task)];
  }

  pub fn active_tool(&self) -> ToolName {
    *self.tool.read()
  }

  pub fn project_roots(&self) -> Vec<ProjectRoot> {
    self.project_roots.read().clone()
  }

  pub async fn on_projects_changed(&self, project_roots: Vec<ProjectRoot>) -> bool {
    self.set_project_roots(project_roots);
    self.rebuild().await
  }

  pub async fn on_tool_changed(&self, tool: ToolName) -> bool {
    self.set_active_tool(tool);
    self.rebuild().await
  }

  fn set_project_roots(&self, project_roots: Vec<ProjectRoot>) {
    log_debug!(
      self.environment,
      "Project roots changed: {}",
      project_roots.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
    );
    *self.project_roots.write() = project_roots;
  }

  fn set_active_tool(&self, tool: ToolName) {
    log_debug!(self.environment, "Format tool changed to {}", tool);
    *self.tool.write() = tool;
  }

  /// Brings the active tool and the cache in line with the settings.
  async fn apply_settings(&self, config: &FormatConfig) {
    let tool_changed = config.tool != self.active_tool();
    let tool_paths_changed = config.tool_paths != *self.applied_tool_paths.lock();
    if tool_changed {
      self.set_active_tool(config.tool);
    }
    if tool_changed || tool_paths_changed {
      self.rebuild_when_idle().await;
    }
  }

  /// Whether formatting can run without first resolving tools.
  pub fn ready(&self) -> bool {
    !self.rebuilding.load(Ordering::Acquire) && self.cache.read().as_ref().is_some_and(|cache| !cache.is_empty())
  }

  pub fn cache(&self) -> Option<Arc<FormatterCache>> {
    self.cache.read().clone()
  }

  /// Resolves every tool for every local project and swaps in the new cache.
  ///
  /// Returns `false` without doing anything when a rebuild is already in
  /// progress. When any search fails the rebuild is abandoned and the
  /// previous cache stays in place.
  pub async fn rebuild(&self) -> bool {
    self.try_rebuild().await == RebuildResult::Rebuilt
  }

  /// Rebuilds once any rebuild in progress has finished, so the new cache
  /// reflects the state at the time of the call.
  async fn rebuild_when_idle(&self) -> bool {
    loop {
      let finished = self.rebuild_finished.notified();
      tokio::pin!(finished);
      // register first so a rebuild finishing in between still wakes this
      finished.as_mut().enable();
      match self.try_rebuild().await {
        RebuildResult::InProgress => finished.await,
        result => return result == RebuildResult::Rebuilt,
      }
    }
  }

  async fn try_rebuild(&self) -> RebuildResult {
    let Some(_guard) = RebuildGuard::acquire(&self.rebuilding, &self.rebuild_finished) else {
      log_debug!(self.environment, "Formatter cache rebuild already in progress.");
      return RebuildResult::InProgress;
    };
    if self.disposed.load(Ordering::Acquire) {
      return RebuildResult::Aborted;
    }

    let keys = get_resolution_keys(&self.project_roots.read());
    let tool_paths = self.settings.borrow().tool_paths.clone();
    let lookups = keys.into_iter().map(|key| {
      let override_path = tool_paths.get(&key.tool).filter(|path| self.environment.path_exists(Path::new(path))).cloned();
      let search = match override_path {
        Some(_) => None,
        None => Some(self.environment.find_tool(key.tool, key.root.as_deref())),
      };
      async move {
        let path = match search {
          Some(search) => search.await?,
          None => override_path,
        };
        Result::<_>::Ok((key, path))
      }
    });

    let resolutions = match futures::future::try_join_all(lookups).await {
      Ok(resolutions) => resolutions,
      Err(err) => {
        log_error!(self.environment, "Error updating formatter cache: {:#}", err);
        return RebuildResult::Aborted;
      }
    };
    for (key, path) in &resolutions {
      match path {
        Some(path) => log_debug!(self.environment, "Resolved {} to {}", key, path),
        None => log_debug!(self.environment, "Could not find {}", key),
      }
    }

    let cache = FormatterCache::from_resolutions(resolutions);
    // checked under the lock so a concurrent dispose can't be undone
    let mut current_cache = self.cache.write();
    if self.disposed.load(Ordering::Acquire) {
      return RebuildResult::Aborted;
    }
    *current_cache = Some(Arc::new(cache));
    *self.applied_tool_paths.lock() = tool_paths;
    RebuildResult::Rebuilt
  }

  /// Looks up the tool for the project, then for no project in particular.
  pub fn resolved_path(&self, tool: ToolName, project_path: Option<&Path>) -> Option<String> {
    let cache = self.cache()?;
    cache.lookup(tool, project_path).map(|path| path.to_string())
  }

  fn project_path_for(&self, file_path: Option<&Path>) -> Option<PathBuf> {
    get_project_path(&self.project_roots.read(), file_path)
  }

  /// Formats the document, replacing its text only when the tool succeeds.
  ///
  /// Failures are logged rather than returned since formatting is a
  /// convenience that should never interrupt the user.
  pub async fn format<TDocument: Document + ?Sized>(&self, document: &mut TDocument, tool: Option<ToolName>, file_path: Option<&Path>) -> FormatOutcome {
    if !document.is_editable() {
      return FormatOutcome::Skipped;
    }

    let tool = tool.unwrap_or_else(|| self.active_tool());
    let file_path = file_path.or(document.file_path()).map(Path::to_path_buf);
    let project_path = self.project_path_for(file_path.as_deref());

    let command = match self.resolved_path(tool, project_path.as_deref()) {
      Some(command) => command,
      None => {
        self.rebuild().await;
        match self.resolved_path(tool, project_path.as_deref()) {
          Some(command) => command,
          None => {
            log_warn!(self.environment, "Skipping format, could not find tool {}.", tool);
            return FormatOutcome::ToolNotFound;
          }
        }
      }
    };

    let mut options = self.environment.exec_options(project_path.as_deref());
    options.input = Some(document.text().to_string());
    let args = tool.format_args(file_path.as_deref());

    let output = match self.environment.exec_sync(&command, &args, &options) {
      Ok(output) => output,
      Err(err) => {
        log_warn!(self.environment, "Error running {}: {:#}", command, err);
        return FormatOutcome::Failed;
      }
    };
    if !output.is_success() {
      // expected while the buffer has syntax errors
      log_debug!(self.environment, "{} exited with code {}: {}", tool, output.exit_code, output.stderr.trim_end());
      return FormatOutcome::Failed;
    }
    if output.stdout == document.text() {
      return FormatOutcome::Unchanged;
    }

    match document.set_text_via_diff(&output.stdout) {
      Ok(()) => FormatOutcome::Formatted,
      Err(err) => {
        log_warn!(self.environment, "Error applying output of {}: {:#}", tool, err);
        FormatOutcome::Failed
      }
    }
  }

  /// Formats with the active tool when formatting on save is enabled.
  pub async fn handle_will_save<TDocument: Document + ?Sized>(&self, document: &mut TDocument) -> FormatOutcome {
    // read on every save so toggling the setting applies immediately
    let format_on_save = self.settings.borrow().format_on_save;
    if !format_on_save {
      return FormatOutcome::Skipped;
    }
    self.format(document, None, None).await
  }

  /// Stops listening for changes and clears the cache. Safe to call more than once.
  pub fn dispose(&self) {
    self.disposed.store(true, Ordering::Release);
    let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
    drop(subscriptions);
    *self.cache.write() = None;
  }
}

async fn listen_for_project_changes<TEnvironment: Environment>(
  weak_coordinator: Weak<FormatCoordinator<TEnvironment>>,
  mut projects: watch::Receiver<Vec<ProjectRoot>>,
  mut rebuild_pending: bool,
) {
  loop {
    if rebuild_pending {
      let Some(coordinator) = weak_coordinator.upgrade() else {
        return;
      };
      coordinator.rebuild_when_idle().await;
    }
    if projects.changed().await.is_err() {
      return;
    }
    let project_roots = projects.borrow_and_update().clone();
    let Some(coordinator) = weak_coordinator.upgrade() else {
      return;
    };
    coordinator.set_project_roots(project_roots);
    rebuild_pending = true;
  }
}

async fn listen_for_settings_changes<TEnvironment: Environment>(
  weak_coordinator: Weak<FormatCoordinator<TEnvironment>>,
  mut settings: watch::Receiver<FormatConfig>,
) {
  loop {
    let config = settings.borrow_and_update().clone();
    let Some(coordinator) = weak_coordinator.upgrade() else {
      return;
    };
    coordinator.apply_settings(&config).await;
    drop(coordinator);
    if settings.changed().await.is_err() {
      return;
    }
  }
}
