// SPDX-License-Identifier: MPL-2.0

//! Reload the logo when its file changes on disk.

use calloop::LoopHandle;
use eyre::{eyre, WrapErr};
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Watches the directory holding the logo, since editors and package
/// managers replace files rather than writing them in place.
pub struct LogoWatcher {
    watcher: RecommendedWatcher,
    target: Rc<RefCell<Option<PathBuf>>>,
    watched_dir: Option<PathBuf>,
}

impl LogoWatcher {
    /// Events are forwarded into `handle`'s loop, where `on_change` runs for
    /// changes to the current target.
    pub fn new<S: 'static>(
        handle: &LoopHandle<'static, S>,
        mut on_change: impl FnMut(&mut S) + 'static,
    ) -> eyre::Result<Self> {
        let (tx, rx) = calloop::channel::sync_channel::<notify::Event>(16);

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        tracing::debug!("event loop gone, dropping file event");
                    }
                }
                Err(why) => tracing::error!(?why, "logo watch error"),
            },
            notify::Config::default(),
        )
        .wrap_err("failed to create file watcher")?;

        let target = Rc::new(RefCell::new(None::<PathBuf>));
        let filter = target.clone();

        handle
            .insert_source(rx, move |event, _, state| {
                let calloop::channel::Event::Msg(event) = event else {
                    return;
                };
                if !is_content_change(&event.kind) {
                    return;
                }

                let hit = filter
                    .borrow()
                    .as_ref()
                    .is_some_and(|target| event.paths.iter().any(|p| p == target));
                if hit {
                    tracing::debug!(paths = ?event.paths, "logo file changed");
                    on_change(state);
                }
            })
            .map_err(|err| eyre!("failed to insert file watch channel into event loop: {err}"))?;

        Ok(Self {
            watcher,
            target,
            watched_dir: None,
        })
    }

    /// Follow `path` from now on. Failures are logged and leave the logo
    /// unwatched.
    pub fn watch(&mut self, path: &Path) {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        if self.watched_dir.as_ref() != Some(&dir) {
            if let Some(old) = self.watched_dir.take() {
                if let Err(why) = self.watcher.unwatch(&old) {
                    tracing::debug!(?why, dir = %old.display(), "unwatch failed");
                }
            }

            if let Err(why) = self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                tracing::warn!(?why, dir = %dir.display(), "cannot watch logo directory");
                self.target.borrow_mut().take();
                return;
            }
            self.watched_dir = Some(dir);
        }

        *self.target.borrow_mut() = Some(path.to_path_buf());
    }

    #[must_use]
    pub fn target(&self) -> Option<PathBuf> {
        self.target.borrow().clone()
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(kind) => !matches!(kind, ModifyKind::Metadata(_)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    #[test]
    fn content_changes() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn watch_tracks_target() {
        let dir = tempfile::tempdir().unwrap();
        let event_loop = calloop::EventLoop::<'static, ()>::try_new().unwrap();
        let mut watcher = LogoWatcher::new(&event_loop.handle(), |_| {}).unwrap();

        let logo = dir.path().join("logo.png");
        watcher.watch(&logo);
        assert_eq!(watcher.target(), Some(logo));

        watcher.watch(Path::new("/nonexistent/dir/logo.png"));
        assert_eq!(watcher.target(), None);
    }
}
