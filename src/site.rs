use crate::accordion::{self, RenderContext};
use crate::assets::{self, AssetQueue};
use crate::config::Config;
use crate::content::{ContentPipeline, CurrentEntry};
use crate::schema::{self, Registry, RegistryError};
use crate::shortcode::Attrs;
use crate::store::ContentStore;
use tracing::{debug, info};

/// Everything the host discovers once at startup: schemas, the embed tag,
/// front-end assets, the body pipeline and the current-entry slot.
#[derive(Debug)]
pub struct Site {
    registry: Registry,
    assets: AssetQueue,
    pipeline: ContentPipeline,
    current: CurrentEntry,
}

impl Site {
    /// Register the FAQ content type, its category taxonomy and the
    /// `faq_accordion` tag, and enqueue the front-end assets. Call once.
    pub fn init(cfg: &Config) -> Result<Self, RegistryError> {
        let mut registry = Registry::default();
        registry.register_content_type(schema::faq_content_type())?;
        registry.register_taxonomy(schema::faq_category_taxonomy())?;
        registry.register_embed(accordion::TAG)?;

        let mut assets = AssetQueue::default();
        assets::enqueue_frontend(&mut assets, cfg)?;

        info!(embeds = ?registry.embeds(), "site initialised");
        Ok(Self {
            registry,
            assets,
            pipeline: ContentPipeline::new(),
            current: CurrentEntry::default(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn assets(&self) -> &AssetQueue {
        &self.assets
    }

    pub fn pipeline(&self) -> &ContentPipeline {
        &self.pipeline
    }

    /// Register tags resolved inside entry bodies.
    pub fn pipeline_mut(&mut self) -> &mut ContentPipeline {
        &mut self.pipeline
    }

    pub fn current(&self) -> &CurrentEntry {
        &self.current
    }

    pub fn context<'a>(&'a self, store: &'a dyn ContentStore) -> RenderContext<'a> {
        RenderContext {
            store,
            pipeline: &self.pipeline,
            current: &self.current,
            embeds: self.registry.embeds(),
        }
    }

    /// Render one `[faq_accordion]` embed from its parsed attributes.
    pub async fn render_embed(&self, store: &dyn ContentStore, attrs: &Attrs) -> String {
        accordion::render(&self.context(store), attrs).await
    }

    /// Replace every registered embed tag in `body` with its rendering.
    pub async fn render_page(&self, store: &dyn ContentStore, body: &str) -> String {
        let out = accordion::expand_embeds(&self.context(store), body).await;
        debug!(bytes = out.len(), "page rendered");
        out
    }
}
