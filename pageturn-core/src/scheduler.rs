//! Multi-document loading
//!
//! A batch opens in two phases: the first document is loaded while the
//! caller waits, then every other document loads concurrently in the
//! background. A background failure only marks its own entry.

use std::rc::Rc;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::document::{Document, DocumentId, LoadState, Locator};
use crate::engine::{DocumentHandle, LoadProgress, RasterEngine};
use crate::environment::Environment;
use crate::error::ViewerError;
use crate::render::RenderRequest;
use crate::session::ViewerSession;
use crate::source::{self, parse_locator_list, DocumentSource};
use crate::viewer::Viewer;

/// Outcome of the background phase of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundSummary {
    pub loaded: usize,
    pub failed: usize,
}

/// What happened to a batch handed to [`Viewer::open_sources`].
#[derive(Debug, Default)]
pub struct OpenReport {
    pub accepted: usize,
    /// Sources dropped before any load attempt.
    pub rejected: Vec<ViewerError>,
    /// Sources whose id repeated an earlier one in the batch.
    pub duplicates: usize,
    /// Already-loaded entries carried over from the previous session.
    pub reused: usize,
    /// Load failure of the first document, if any.
    pub active_load: Option<ViewerError>,
    /// Settles once every other document finished loading.
    pub background: Option<JoinHandle<BackgroundSummary>>,
}

/// Extra inputs for [`Viewer::open_sources_with`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Document to activate, by position among the accepted sources.
    pub active: Option<usize>,
    /// Display names by source position; blank entries keep the derived name.
    pub titles: Vec<String>,
}

/// Placement of a document added with [`Viewer::add_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    pub activate: bool,
    /// Insert before the other documents instead of after them.
    pub prepend: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            activate: true,
            prepend: false,
        }
    }
}

impl<E, V> Viewer<E, V>
where
    E: RasterEngine + 'static,
    V: Environment + 'static,
{
    /// Replace the session with a new batch of documents.
    ///
    /// Returns once the first document has loaded (or failed); the rest
    /// keep loading on the current `LocalSet`.
    pub async fn open_sources(
        self: &Rc<Self>,
        sources: Vec<DocumentSource>,
    ) -> Result<OpenReport, ViewerError> {
        self.open_sources_with(sources, OpenOptions::default()).await
    }

    /// [`Viewer::open_sources`] with an active document and display titles.
    ///
    /// Entries of the current session that are already loaded and whose id
    /// comes back in the batch are kept as they are. When the batch names
    /// exactly the open documents, in order, nothing reloads and only the
    /// requested activation happens.
    pub async fn open_sources_with(
        self: &Rc<Self>,
        sources: Vec<DocumentSource>,
        options: OpenOptions,
    ) -> Result<OpenReport, ViewerError> {
        let mut report = OpenReport::default();
        let mut documents: Vec<Document<E::Document>> = Vec::with_capacity(sources.len());

        for (index, source) in sources.into_iter().enumerate() {
            match source::resolve(source, index) {
                Ok(doc) if documents.iter().any(|existing| existing.id == doc.id) => {
                    debug!(document = %doc.id, "skipping duplicate source");
                    report.duplicates += 1;
                }
                Ok(mut doc) => {
                    if let Some(title) = options
                        .titles
                        .get(index)
                        .map(|title| title.trim())
                        .filter(|title| !title.is_empty())
                    {
                        doc.display_name = title.to_string();
                    }
                    documents.push(doc);
                }
                Err(err) => {
                    warn!(error = %err, "rejecting source");
                    report.rejected.push(err);
                }
            }
        }

        if documents.is_empty() {
            return match report.rejected.first() {
                Some(err) => Err(err.clone()),
                None => Ok(report),
            };
        }

        let ids: Vec<DocumentId> = documents.iter().map(|doc| doc.id.clone()).collect();
        report.accepted = ids.len();
        let active = options.active.filter(|index| *index < ids.len()).unwrap_or(0);

        let unchanged = self.state.with(|s| {
            s.documents.len() == ids.len()
                && s.documents.iter().zip(&ids).all(|(doc, id)| doc.id == *id)
        });
        if unchanged {
            report.reused = ids.len();
            debug!(documents = ids.len(), "source set unchanged; keeping session");
            if options.active.is_some() {
                if let Err(err) = self.switch_to(active).await {
                    report.active_load = Some(err);
                }
            }
            return Ok(report);
        }

        self.session_generation.set(self.session_generation.get() + 1);
        self.invalidate_renders();
        self.gestures.borrow_mut().reset();
        self.gesture_epoch.set(self.gesture_epoch.get() + 1);
        let default_scale = self.config.scale_bounds().clamp(self.config.default_scale);
        let (reused, to_load) = self.state.update(move |s| {
            let mut previous = std::mem::take(&mut s.documents);
            let mut to_load = Vec::new();
            for doc in &mut documents {
                let kept = previous
                    .iter()
                    .position(|old| old.id == doc.id && old.is_loaded())
                    .map(|pos| previous.swap_remove(pos));
                match kept {
                    Some(mut kept) => {
                        kept.display_name = std::mem::take(&mut doc.display_name);
                        *doc = kept;
                    }
                    None => {
                        doc.mark_loading();
                        to_load.push(doc.id.clone());
                    }
                }
            }
            let reused = documents.len() - to_load.len();
            // Zoom carries over when the new batch keeps any open document.
            let scale = if reused > 0 { s.scale } else { default_scale };
            *s = ViewerSession::new(scale);
            s.documents = documents;
            s.active_index = Some(active);
            (reused, to_load)
        });
        report.reused = reused;
        info!(
            documents = ids.len(),
            reused,
            rejected = report.rejected.len(),
            duplicates = report.duplicates,
            "opening document batch"
        );

        let active_id = &ids[active];
        let first = if to_load.contains(active_id) {
            self.run_load(active_id.clone()).await
        } else {
            self.show_active().await
        };
        if let Err(err) = first {
            report.active_load = Some(err);
        }

        let rest: Vec<DocumentId> = to_load.into_iter().filter(|id| id != active_id).collect();
        if !rest.is_empty() {
            report.background = Some(self.spawn_background_loads(rest));
        }
        Ok(report)
    }

    /// Add one document to the open session and load it.
    ///
    /// A source whose id is already open is not added twice: the existing
    /// entry is activated instead, unless `options.activate` is off. The new
    /// document becomes active when asked to or when nothing else is.
    /// Returns the entry's position.
    pub async fn add_source(
        &self,
        source: DocumentSource,
        options: AddOptions,
    ) -> Result<usize, ViewerError> {
        let position = self.state.with(|s| s.documents.len());
        let doc: Document<E::Document> = source::resolve(source, position)?;

        if let Some(index) = self.state.with(|s| s.index_of(&doc.id)) {
            debug!(document = %doc.id, index, "source already open");
            if options.activate {
                self.switch_to(index).await?;
            }
            return Ok(index);
        }

        let id = doc.id.clone();
        let (index, activate) = self.state.update(|s| {
            let index = if options.prepend { 0 } else { s.documents.len() };
            s.documents.insert(index, doc);
            if options.prepend {
                s.active_index = s.active_index.map(|active| active + 1);
            }
            (index, options.activate || s.active_index.is_none())
        });
        info!(document = %id, index, activate, "document added");

        if activate {
            self.switch_to(index).await?;
        } else {
            self.load_document(index).await?;
        }
        Ok(index)
    }

    /// Open the locators carried by the environment's navigation value.
    pub async fn open_from_environment(self: &Rc<Self>) -> Result<Option<OpenReport>, ViewerError> {
        let Some(location) = self.env.current_location() else {
            return Ok(None);
        };
        let locators = parse_locator_list(&location);
        if locators.is_empty() {
            return Ok(None);
        }
        let sources = locators.into_iter().map(DocumentSource::Locator).collect();
        self.open_sources(sources).await.map(Some)
    }

    /// Load the document at `index` unless it is already loading or loaded.
    pub async fn load_document(&self, index: usize) -> Result<(), ViewerError> {
        let entry = self
            .state
            .with(|s| s.documents.get(index).map(|doc| (doc.id.clone(), doc.load_state)));
        match entry {
            None => Err(ViewerError::NoSuchDocument(index)),
            Some((id, LoadState::Loading | LoadState::Loaded)) => {
                debug!(document = %id, "load already in progress or done");
                Ok(())
            }
            Some((id, LoadState::Idle | LoadState::Error)) => self.run_load(id).await,
        }
    }

    /// Make the document at `index` active.
    ///
    /// A loaded document seen for the first time is fitted to the container;
    /// one seen before is shown at the current scale on its last page.
    pub async fn switch_to(&self, index: usize) -> Result<(), ViewerError> {
        let changed = self.state.update(|s| {
            if index >= s.documents.len() {
                return Err(ViewerError::NoSuchDocument(index));
            }
            let changed = s.active_index != Some(index);
            if changed {
                s.active_index = Some(index);
                s.error_message = None;
                s.clear_view();
                if !s.documents[index].is_loaded() {
                    s.total_pages = 0;
                    s.current_page = 1;
                }
            }
            Ok(changed)
        })?;

        if changed {
            info!(index, "switching document");
            self.invalidate_renders();
        } else if self.state.with(|s| s.surface.is_some()) {
            return Ok(());
        }
        self.show_active().await
    }

    /// Remove the document at `index`. When it was active, the entry now at
    /// the same position (else the one before it) takes over.
    pub async fn close_document(&self, index: usize) -> Result<(), ViewerError> {
        let (removed, was_active) = self.state.update(|s| {
            if index >= s.documents.len() {
                return Err(ViewerError::NoSuchDocument(index));
            }
            let removed = s.documents.remove(index);
            let remaining = s.documents.len();
            let was_active = s.active_index == Some(index);
            s.active_index = match s.active_index {
                _ if remaining == 0 => None,
                Some(active) if active > index => Some(active - 1),
                Some(active) if active == index => Some(index.min(remaining - 1)),
                other => other,
            };
            if was_active {
                s.clear_view();
                s.error_message = None;
                s.total_pages = 0;
                s.current_page = 1;
            }
            if remaining == 0 {
                s.auto_fit_scale = None;
            }
            Ok((removed, was_active))
        })?;

        info!(document = %removed.id, index, was_active, "document closed");
        drop(removed);

        if was_active {
            self.invalidate_renders();
            self.show_active().await
        } else {
            Ok(())
        }
    }

    /// Drop every document and return to an empty session.
    pub fn reset(&self) {
        self.session_generation.set(self.session_generation.get() + 1);
        self.invalidate_renders();
        self.gestures.borrow_mut().reset();
        self.gesture_epoch.set(self.gesture_epoch.get() + 1);
        self.resize_generation.set(self.resize_generation.get() + 1);
        let default_scale = self.config.scale_bounds().clamp(self.config.default_scale);
        self.state.update(|s| *s = ViewerSession::new(default_scale));
        info!("session reset");
    }

    /// Reload an errored active document, or re-render a loaded one.
    pub async fn retry_active(&self) -> Result<(), ViewerError> {
        let active = self.state.with(|s| {
            s.active_document()
                .map(|doc| (doc.id.clone(), doc.load_state, s.current_page))
        });
        match active {
            None => Ok(()),
            Some((_, LoadState::Loading, _)) => Ok(()),
            Some((_, LoadState::Loaded, page)) => {
                self.execute_render(RenderRequest::new(page, false), None)
                    .await
            }
            Some((id, LoadState::Idle | LoadState::Error, _)) => {
                info!(document = %id, "retrying load");
                self.run_load(id).await
            }
        }
    }

    fn spawn_background_loads(self: &Rc<Self>, ids: Vec<DocumentId>) -> JoinHandle<BackgroundSummary> {
        let viewer = Rc::clone(self);
        tokio::task::spawn_local(async move {
            let mut tasks = JoinSet::new();
            for id in ids {
                let viewer = Rc::clone(&viewer);
                tasks.spawn_local(async move { viewer.run_load(id).await });
            }

            let mut summary = BackgroundSummary::default();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => summary.loaded += 1,
                    Ok(Err(_)) => summary.failed += 1,
                    Err(err) => {
                        warn!(error = %err, "background load task did not finish");
                        summary.failed += 1;
                    }
                }
            }
            info!(
                loaded = summary.loaded,
                failed = summary.failed,
                "background loads settled"
            );
            summary
        })
    }

    /// Show whatever the active document allows: render it when loaded,
    /// start loading it when idle or errored, wait when already loading.
    pub(crate) async fn show_active(&self) -> Result<(), ViewerError> {
        let active = self
            .state
            .with(|s| s.active_document().map(|doc| (doc.id.clone(), doc.load_state)));
        match active {
            None => Ok(()),
            Some((_, LoadState::Loaded)) => match self.prepare_active_view() {
                Some(request) => self.execute_render(request, None).await,
                None => Ok(()),
            },
            Some((id, LoadState::Idle | LoadState::Error)) => self.run_load(id).await,
            Some((id, LoadState::Loading)) => {
                debug!(document = %id, "active document still loading");
                Ok(())
            }
        }
    }

    /// Point the session at the loaded active document and build its first
    /// render request. Flips the document's first-view flag.
    fn prepare_active_view(&self) -> Option<RenderRequest> {
        self.state.update(|s| {
            let index = s.active_index?;
            let doc = s.documents.get_mut(index).filter(|doc| doc.is_loaded())?;
            let first_view = !doc.has_been_viewed;
            doc.has_been_viewed = true;
            let page = doc.start_page();
            let page_count = doc.page_count;
            if first_view {
                info!(document = %doc.id, page, "first view; fitting page to width");
            }

            s.total_pages = page_count;
            s.current_page = page;
            s.error_message = None;
            Some(RenderRequest::new(page, first_view))
        })
    }

    /// Open one document by id and record the result on its entry.
    ///
    /// Whether the document is active is checked when the load completes, so
    /// a switch made during the load is respected. A load that outlives its
    /// session is dropped.
    pub(crate) async fn run_load(&self, id: DocumentId) -> Result<(), ViewerError> {
        let generation = self.session_generation.get();
        let entry = self.state.update(|s| {
            let doc = s.documents.iter_mut().find(|doc| doc.id == id)?;
            doc.mark_loading();
            Some((doc.locator.clone(), doc.display_name.clone()))
        });
        let Some((locator, name)) = entry else {
            return Ok(());
        };

        info!(document = %id, %name, "loading document");
        let opened = match &locator {
            Locator::Remote(url) => {
                let progress = LoadProgress::new(name.as_str());
                self.engine
                    .open_from_locator(url, self.range_hints(), &progress)
                    .await
            }
            Locator::Bytes { data, .. } => self.engine.open_from_bytes(Rc::clone(data)).await,
        };

        if self.session_generation.get() != generation {
            debug!(document = %id, "session replaced while loading; result dropped");
            return Ok(());
        }

        let outcome = self.state.update(|s| {
            let index = s.index_of(&id)?;
            let is_active = s.active_index == Some(index);
            let doc = &mut s.documents[index];
            Some(match opened {
                Ok(handle) => {
                    let pages = handle.page_count();
                    doc.mark_loaded(handle, pages);
                    Ok((is_active, pages))
                }
                Err(err) => {
                    doc.mark_error(err.to_string());
                    if is_active {
                        s.error_message = Some(format!("Failed to load {name}: {err}"));
                        s.total_pages = 0;
                    }
                    Err(err)
                }
            })
        });

        match outcome {
            None => {
                debug!(document = %id, "document closed before its load finished");
                Ok(())
            }
            Some(Ok((is_active, pages))) => {
                info!(document = %id, pages, is_active, "document loaded");
                match is_active.then(|| self.prepare_active_view()).flatten() {
                    Some(request) => self.execute_render(request, None).await,
                    None => Ok(()),
                }
            }
            Some(Err(source)) => {
                warn!(document = %id, error = %source, "document failed to load");
                Err(ViewerError::LoadFailed { name, source })
            }
        }
    }
}
