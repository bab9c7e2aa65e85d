//! The page controller: one document, its anchor collection, and the
//! storage behind it.
//!
//! Every user-facing operation goes through [`Highlighter`], which keeps the
//! [`ReconcileContext`] in step with the DOM and the local store. Remote sync
//! is always attempted last and never fails an operation.

use highlight_notes_config::Config;

use crate::anchoring::{Anchor, AnchorPatch, HighlightId, Resolved, build_anchor, resolve};
use crate::dom::{Document, DomRange, NodeId};
use crate::error::HighlightError;
use crate::reconcile::ReconcileContext;
use crate::render::{self, Interaction, InteractionOutcome, Renderer};
use crate::store::{HighlightRepository, SweepReport, Syncer};

/// Outcome of applying the anchor collection to the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Markers drawn by this pass.
    pub applied: usize,
    /// Anchors whose marker was already attached.
    pub present: usize,
    /// Anchors that could not be located or drawn this time.
    pub missing: Vec<HighlightId>,
}

impl PassReport {
    pub fn rendered(&self) -> usize {
        self.applied + self.present
    }
}

pub struct Highlighter {
    doc: Document,
    context: ReconcileContext,
    renderer: Renderer,
    repo: HighlightRepository,
    syncer: Option<Syncer>,
    config: Config,
}

impl Highlighter {
    pub fn new(doc: Document, url: impl Into<String>, repo: HighlightRepository, config: Config) -> Self {
        let renderer = Renderer::new(&config.render);
        Self {
            doc,
            context: ReconcileContext::new(url),
            renderer,
            repo,
            syncer: None,
            config,
        }
    }

    pub fn with_syncer(mut self, syncer: Syncer) -> Self {
        self.syncer = Some(syncer);
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn context(&self) -> &ReconcileContext {
        &self.context
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn scope(&self) -> NodeId {
        self.doc.body()
    }

    pub fn marker_count(&self) -> usize {
        render::marker_count(&self.doc, self.scope())
    }

    /// Read the enabled flag and the stored collection into the context.
    /// Nothing is drawn until the first pass. Returns the number of anchors.
    pub async fn load(&mut self) -> Result<usize, HighlightError> {
        let enabled = self.repo.load_enabled().await?;
        let anchors = self.repo.load(self.context.url()).await?;
        self.context.set_enabled(enabled);
        self.context.replace_all(anchors);
        render::set_visible(&mut self.doc, enabled);
        if !enabled {
            log::info!("Highlighter disabled by user");
        }
        log::info!(
            "Loaded {} highlight(s) for {}",
            self.context.len(),
            self.context.url()
        );
        Ok(self.context.len())
    }

    /// Resolve and draw every anchor that has no marker yet, in collection
    /// order. Each anchor is resolved against the document as left by the
    /// ones before it.
    pub fn apply_all(&mut self) -> PassReport {
        let scope = self.scope();
        let anchors = self.context.anchors().to_vec();
        let mut report = PassReport::default();

        for anchor in &anchors {
            if render::find_marker(&self.doc, &anchor.id).is_some() {
                report.present += 1;
                continue;
            }
            match resolve(&self.doc, scope, anchor, &self.config.anchoring) {
                Resolved::Found(resolution) => {
                    if !resolution.verified {
                        log::debug!(
                            "Context of {} did not match, using first occurrence",
                            anchor.id
                        );
                    }
                    match self.renderer.render(&mut self.doc, &resolution.range, anchor) {
                        Ok(_) => report.applied += 1,
                        Err(e) => {
                            log::warn!("Failed to render {}: {e}", anchor.id);
                            report.missing.push(anchor.id.clone());
                        }
                    }
                }
                Resolved::NotFound(reason) => {
                    log::warn!("Could not locate {} ({reason:?})", anchor.id);
                    report.missing.push(anchor.id.clone());
                }
            }
        }

        log::info!(
            "Applied {}/{} highlight(s)",
            report.rendered(),
            anchors.len()
        );
        report
    }

    /// Redraw the collection if markers have gone missing. Returns `None`
    /// when the page already shows everything it should.
    pub fn reconcile_pass(&mut self) -> Option<PassReport> {
        self.renderer.forget_detached(&self.doc);
        let expected = self.context.expected_markers();
        let present = self.marker_count();
        if present >= expected {
            log::debug!("Reconcile: {present}/{expected} markers present");
            return None;
        }
        log::info!("Reconcile: {present}/{expected} markers present, reapplying");
        Some(self.apply_all())
    }

    /// Create a highlight from a live selection.
    ///
    /// The anchor is persisted before anything else changes; if that fails
    /// the page and the context are left as they were. Returns `None` for
    /// empty selections.
    pub async fn create(
        &mut self,
        range: &DomRange,
        color: Option<&str>,
        note: Option<&str>,
    ) -> Result<Option<Anchor>, HighlightError> {
        let color = color.unwrap_or_else(|| self.config.render.default_color());
        let Some(anchor) = build_anchor(
            &self.doc,
            self.scope(),
            range,
            color,
            note,
            &self.config.anchoring,
        ) else {
            log::debug!("Ignoring empty selection");
            return Ok(None);
        };

        self.repo.append(self.context.url(), &anchor).await?;
        self.context.push(anchor.clone());

        if self.context.enabled()
            && let Err(e) = self.renderer.render(&mut self.doc, range, &anchor)
        {
            log::warn!("Failed to render new highlight {}: {e}", anchor.id);
        }
        log::info!("Created highlight {}", anchor.id);

        if let Some(syncer) = &self.syncer
            && let Err(e) = syncer.push_save(self.context.url(), &anchor).await
        {
            log::warn!("Could not queue sync for {}: {e}", anchor.id);
        }
        Ok(Some(anchor))
    }

    /// Change color and/or note of an existing highlight.
    pub async fn update(
        &mut self,
        id: &HighlightId,
        patch: &AnchorPatch,
    ) -> Result<Anchor, HighlightError> {
        let anchor = self
            .context
            .update(id, patch)
            .cloned()
            .ok_or_else(|| HighlightError::UnknownHighlight(id.to_string()))?;
        self.renderer.restyle(&mut self.doc, &anchor)?;
        self.repo.update(self.context.url(), id, patch).await?;
        log::info!("Updated highlight {id}");

        if let Some(syncer) = &self.syncer
            && let Err(e) = syncer.push_save(self.context.url(), &anchor).await
        {
            log::warn!("Could not queue sync for {id}: {e}");
        }
        Ok(anchor)
    }

    /// Remove a highlight from the page, the context and the store.
    ///
    /// The caller is expected to open a suppression window so the resulting
    /// mutations do not trigger a redraw.
    pub async fn delete(&mut self, id: &HighlightId) -> Result<Anchor, HighlightError> {
        let anchor = self
            .context
            .remove(id)
            .ok_or_else(|| HighlightError::UnknownHighlight(id.to_string()))?;
        self.renderer.unrender(&mut self.doc, id)?;
        self.repo.delete(self.context.url(), id).await?;
        log::info!("Deleted highlight {id}");

        if let Some(syncer) = &self.syncer
            && let Err(e) = syncer.push_delete(id).await
        {
            log::warn!("Could not queue sync for {id}: {e}");
        }
        Ok(anchor)
    }

    /// Switch highlighting on or off. Repeating the current state is a
    /// no-op; returns whether anything changed.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<bool, HighlightError> {
        if self.context.enabled() == enabled {
            return Ok(false);
        }
        self.repo.save_enabled(enabled).await?;
        self.context.set_enabled(enabled);
        render::set_visible(&mut self.doc, enabled);
        if enabled {
            log::info!("Highlighter enabled");
            if self.marker_count() == 0 {
                self.apply_all();
            }
        } else {
            log::info!("Highlighter disabled");
        }
        Ok(true)
    }

    /// The marker to bring into view for `id`.
    pub fn scroll_to(&self, id: &HighlightId) -> Option<NodeId> {
        let marker = render::find_marker(&self.doc, id);
        if marker.is_none() {
            log::warn!("Highlight not found for id: {id}");
        }
        marker
    }

    pub fn interact(&self, id: &HighlightId, interaction: Interaction) -> Option<InteractionOutcome> {
        if !self.context.enabled() {
            return None;
        }
        self.renderer.interact(id, interaction)
    }

    /// Pick up changes another page made to the stored collection: markers
    /// of anchors that are gone are removed, new ones drawn.
    pub async fn refresh(&mut self) -> Result<PassReport, HighlightError> {
        let stored = self.repo.load(self.context.url()).await?;
        let stale: Vec<HighlightId> = self
            .context
            .anchors()
            .iter()
            .filter(|anchor| !stored.iter().any(|s| s.id == anchor.id))
            .map(|anchor| anchor.id.clone())
            .collect();
        for id in &stale {
            self.renderer.unrender(&mut self.doc, id)?;
        }
        self.context.replace_all(stored);
        if !self.context.enabled() {
            return Ok(PassReport::default());
        }
        Ok(self.apply_all())
    }

    /// Merge remote records for this page into the store, then refresh.
    pub async fn pull_remote(&mut self) -> Result<usize, HighlightError> {
        let Some(syncer) = &self.syncer else {
            return Ok(0);
        };
        let added = syncer.pull(self.context.url(), &self.repo).await?;
        if added > 0 {
            self.refresh().await?;
        }
        Ok(added)
    }

    /// Clear a sync sweep flag left by a previous run that never finished.
    pub async fn recover_sync_queue(&self) -> Result<bool, HighlightError> {
        match &self.syncer {
            Some(syncer) => Ok(syncer.queue().recover().await?),
            None => Ok(false),
        }
    }

    /// Retry queued remote operations. `None` without a syncer.
    pub async fn process_sync_queue(&self) -> Result<Option<SweepReport>, HighlightError> {
        match &self.syncer {
            Some(syncer) => Ok(Some(syncer.process_queue().await?)),
            None => Ok(None),
        }
    }
}
