//! Front-end stylesheet and script queue.
use crate::config::Config;
use crate::escape::html_attr;
use crate::schema::RegistryError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const STYLE_HANDLE: &str = "faq-style";
pub const SCRIPT_HANDLE: &str = "faq-script";
pub const JQUERY: &str = "jquery";
pub const JQUERY_UI_ACCORDION: &str = "jquery-ui-accordion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Style,
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub handle: String,
    pub kind: AssetKind,
    pub src: String,
    pub deps: Vec<String>,
    pub version: Option<String>,
    /// Scripts only: emit before `</body>` instead of in `<head>`.
    pub in_footer: bool,
}

impl Asset {
    pub fn style(handle: &str, src: impl Into<String>) -> Self {
        Self {
            handle: handle.to_string(),
            kind: AssetKind::Style,
            src: src.into(),
            deps: Vec::new(),
            version: None,
            in_footer: false,
        }
    }

    pub fn script(handle: &str, src: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Script,
            ..Self::style(handle, src)
        }
    }

    pub fn deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn in_footer(mut self) -> Self {
        self.in_footer = true;
        self
    }

    fn url(&self) -> String {
        match &self.version {
            Some(v) if self.src.contains('?') => format!("{}&ver={}", self.src, v),
            Some(v) => format!("{}?ver={}", self.src, v),
            None => self.src.clone(),
        }
    }

    fn tag(&self) -> String {
        match self.kind {
            AssetKind::Style => format!(
                r#"<link rel="stylesheet" id="{}-css" href="{}" media="all" />"#,
                html_attr(&self.handle),
                html_attr(&self.url())
            ),
            AssetKind::Script => format!(
                r#"<script src="{}" id="{}-js"></script>"#,
                html_attr(&self.url()),
                html_attr(&self.handle)
            ),
        }
    }
}

/// Registered assets plus the handles a page asked for.
#[derive(Debug, Default, Clone)]
pub struct AssetQueue {
    registered: BTreeMap<String, Asset>,
    enqueued: Vec<String>,
}

impl AssetQueue {
    /// Make an asset known without requesting it; it is emitted only when an
    /// enqueued asset depends on it.
    pub fn register(&mut self, asset: Asset) {
        self.registered.insert(asset.handle.clone(), asset);
    }

    pub fn enqueue(&mut self, asset: Asset) -> Result<(), RegistryError> {
        let handle = asset.handle.clone();
        if self.enqueued.contains(&handle) {
            return Err(RegistryError::DuplicateAsset(handle));
        }
        self.register(asset);
        self.enqueued.push(handle);
        Ok(())
    }

    pub fn is_enqueued(&self, handle: &str) -> bool {
        self.enqueued.iter().any(|h| h == handle)
    }

    /// Enqueued assets and their dependencies, every dependency before its
    /// dependents.
    pub fn resolve(&self) -> Result<Vec<&Asset>, RegistryError> {
        let mut visiting = BTreeSet::new();
        let mut done = BTreeSet::new();
        let mut out = Vec::new();
        for handle in &self.enqueued {
            if let Some(asset) = self.registered.get(handle) {
                self.visit(asset, &mut visiting, &mut done, &mut out)?;
            }
        }
        Ok(out)
    }

    fn visit<'a>(
        &'a self,
        asset: &'a Asset,
        visiting: &mut BTreeSet<String>,
        done: &mut BTreeSet<String>,
        out: &mut Vec<&'a Asset>,
    ) -> Result<(), RegistryError> {
        if done.contains(&asset.handle) {
            return Ok(());
        }
        if !visiting.insert(asset.handle.clone()) {
            return Err(RegistryError::DependencyCycle(asset.handle.clone()));
        }
        for dep in &asset.deps {
            let dep_asset =
                self.registered
                    .get(dep)
                    .ok_or_else(|| RegistryError::UnknownDependency {
                        asset: asset.handle.clone(),
                        dependency: dep.clone(),
                    })?;
            self.visit(dep_asset, visiting, done, out)?;
        }
        visiting.remove(&asset.handle);
        done.insert(asset.handle.clone());
        out.push(asset);
        Ok(())
    }

    /// Stylesheets and head scripts.
    pub fn render_head(&self) -> Result<String, RegistryError> {
        let resolved = self.resolve()?;
        let styles = resolved.iter().filter(|a| a.kind == AssetKind::Style);
        let scripts = resolved
            .iter()
            .filter(|a| a.kind == AssetKind::Script && !a.in_footer);
        Ok(styles.chain(scripts).map(|a| a.tag()).collect::<Vec<_>>().join("\n"))
    }

    /// Scripts marked for the footer.
    pub fn render_footer(&self) -> Result<String, RegistryError> {
        let resolved = self.resolve()?;
        Ok(resolved
            .iter()
            .filter(|a| a.kind == AssetKind::Script && a.in_footer)
            .map(|a| a.tag())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Register the accordion library and enqueue the FAQ stylesheet and script.
pub fn enqueue_frontend(queue: &mut AssetQueue, cfg: &Config) -> Result<(), RegistryError> {
    let site = &cfg.site;
    queue.register(Asset::script(JQUERY, site.jquery_url.clone()));
    queue.register(Asset::script(JQUERY_UI_ACCORDION, site.jquery_ui_url.clone()).deps(&[JQUERY]));

    let base = site.assets_url.trim_end_matches('/');
    queue.enqueue(
        Asset::style(STYLE_HANDLE, format!("{base}/faq.css")).version(site.asset_version.clone()),
    )?;
    queue.enqueue(
        Asset::script(SCRIPT_HANDLE, format!("{base}/faq.js"))
            .deps(&[JQUERY, JQUERY_UI_ACCORDION])
            .version(site.asset_version.clone())
            .in_footer(),
    )?;
    debug!(assets_url = base, "front-end assets enqueued");
    Ok(())
}
