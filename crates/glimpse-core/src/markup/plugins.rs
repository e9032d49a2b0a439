//! Markup tree plugins.
//!
//! Plugins are looked up by name in a [`PluginRegistry`] and only loaded for
//! Trusted evaluation. A failing plugin is reported and skipped, whether it
//! fails to load or fails while transforming a document.

use anyhow::{Context, Result, bail};
use glimpse_config::PluginSpec;
use markdown::mdast::{
    AttributeContent, AttributeValue, MdxJsxAttribute, MdxJsxFlowElement, MdxJsxTextElement, Node,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::trust::SecurityMode;

/// A transform over the parsed markup tree.
pub trait MarkupPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reject bad options at load time rather than on every render.
    fn validate_options(&self, options: Option<&Value>) -> Result<()> {
        let _ = options;
        Ok(())
    }

    fn transform(&self, tree: &mut Node, options: Option<&Value>) -> Result<()>;
}

/// A plugin paired with the options it was configured with.
#[derive(Clone)]
pub struct LoadedPlugin {
    plugin: Arc<dyn MarkupPlugin>,
    options: Option<Value>,
}

impl LoadedPlugin {
    pub fn name(&self) -> &'static str {
        self.plugin.name()
    }

    pub fn apply(&self, tree: &mut Node) -> Result<()> {
        self.plugin
            .transform(tree, self.options.as_ref())
            .with_context(|| format!("plugin '{}' failed", self.plugin.name()))
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name())
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plugin '{name}': {message}")]
pub struct PluginLoadError {
    pub name: String,
    pub message: String,
}

pub struct PluginRegistry {
    plugins: FxHashMap<String, Arc<dyn MarkupPlugin>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: FxHashMap::default(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(HeadingIdsPlugin));
        registry.register(Arc::new(ExternalLinksPlugin));
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn MarkupPlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate `specs` in order. Safe mode loads nothing.
    pub fn load_plugins(
        &self,
        specs: &[PluginSpec],
        mode: SecurityMode,
    ) -> (Vec<LoadedPlugin>, Vec<PluginLoadError>) {
        if mode == SecurityMode::Safe {
            if !specs.is_empty() {
                tracing::debug!(count = specs.len(), "plugins skipped in safe mode");
            }
            return (Vec::new(), Vec::new());
        }

        let mut loaded = Vec::new();
        let mut errors = Vec::new();
        for spec in specs {
            let Some(plugin) = self.plugins.get(spec.name()) else {
                errors.push(PluginLoadError {
                    name: spec.name().to_string(),
                    message: "unknown plugin".to_string(),
                });
                continue;
            };
            if let Err(err) = plugin.validate_options(spec.options()) {
                errors.push(PluginLoadError {
                    name: spec.name().to_string(),
                    message: format!("{err:#}"),
                });
                continue;
            }
            loaded.push(LoadedPlugin {
                plugin: plugin.clone(),
                options: spec.options().cloned(),
            });
        }
        for err in &errors {
            tracing::warn!(plugin = %err.name, error = %err.message, "plugin not loaded");
        }
        (loaded, errors)
    }
}

fn parse_options<T: for<'de> Deserialize<'de> + Default>(options: Option<&Value>) -> Result<T> {
    match options {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone()).context("invalid options"),
    }
}

fn literal(name: &str, value: impl Into<String>) -> AttributeContent {
    AttributeContent::Property(MdxJsxAttribute {
        name: name.to_string(),
        value: Some(AttributeValue::Literal(value.into())),
    })
}

fn walk_mut(node: &mut Node, visit: &mut dyn FnMut(&mut Node)) {
    visit(node);
    if let Some(children) = node.children_mut() {
        for child in children {
            walk_mut(child, visit);
        }
    }
}

/// Plain text of a subtree.
pub(crate) fn text_content(node: &Node) -> String {
    match node {
        Node::Text(text) => text.value.clone(),
        Node::InlineCode(code) => code.value.clone(),
        other => other
            .children()
            .map(|children| children.iter().map(text_content).collect())
            .unwrap_or_default(),
    }
}

pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HeadingIdsOptions {
    prefix: String,
}

/// Adds slug `id`s to headings; duplicates get `-1`, `-2`, ... suffixes.
pub struct HeadingIdsPlugin;

impl MarkupPlugin for HeadingIdsPlugin {
    fn name(&self) -> &'static str {
        "heading-ids"
    }

    fn validate_options(&self, options: Option<&Value>) -> Result<()> {
        parse_options::<HeadingIdsOptions>(options).map(|_| ())
    }

    fn transform(&self, tree: &mut Node, options: Option<&Value>) -> Result<()> {
        let options: HeadingIdsOptions = parse_options(options)?;
        let mut seen: FxHashSet<String> = FxHashSet::default();
        walk_mut(tree, &mut |node| {
            if !matches!(node, Node::Heading(_)) {
                return;
            }
            let base = slugify(&text_content(node));
            let base = if base.is_empty() { "section".to_string() } else { base };
            let mut id = format!("{}{base}", options.prefix);
            let mut n = 0;
            while !seen.insert(id.clone()) {
                n += 1;
                id = format!("{}{base}-{n}", options.prefix);
            }
            let Node::Heading(heading) = node else { return };
            let element = MdxJsxFlowElement {
                children: std::mem::take(&mut heading.children),
                position: heading.position.take(),
                name: Some(format!("h{}", heading.depth)),
                attributes: vec![literal("id", id)],
            };
            *node = Node::MdxJsxFlowElement(element);
        });
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ExternalLinksOptions {
    target: Option<String>,
    rel: String,
}

impl Default for ExternalLinksOptions {
    fn default() -> Self {
        Self {
            target: Some("_blank".to_string()),
            rel: "noopener noreferrer".to_string(),
        }
    }
}

/// Marks absolute links with `target` and `rel`.
pub struct ExternalLinksPlugin;

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

impl MarkupPlugin for ExternalLinksPlugin {
    fn name(&self) -> &'static str {
        "external-links"
    }

    fn validate_options(&self, options: Option<&Value>) -> Result<()> {
        let options: ExternalLinksOptions = parse_options(options)?;
        if options.rel.contains(['"', '<', '>']) {
            bail!("rel contains markup characters");
        }
        Ok(())
    }

    fn transform(&self, tree: &mut Node, options: Option<&Value>) -> Result<()> {
        let options: ExternalLinksOptions = parse_options(options)?;
        walk_mut(tree, &mut |node| {
            let Node::Link(link) = node else { return };
            if !is_external(&link.url) {
                return;
            }
            let mut attributes = vec![literal("href", link.url.clone())];
            if let Some(title) = &link.title {
                attributes.push(literal("title", title.clone()));
            }
            if let Some(target) = &options.target {
                attributes.push(literal("target", target.clone()));
            }
            attributes.push(literal("rel", options.rel.clone()));
            let element = MdxJsxTextElement {
                children: std::mem::take(&mut link.children),
                position: link.position.take(),
                name: Some("a".to_string()),
                attributes,
            };
            *node = Node::MdxJsxTextElement(element);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(source: &str) -> Node {
        markdown::to_mdast(source, &markdown::ParseOptions::mdx()).unwrap()
    }

    fn attribute(node: &Node, name: &str) -> Option<String> {
        let attributes = match node {
            Node::MdxJsxFlowElement(el) => &el.attributes,
            Node::MdxJsxTextElement(el) => &el.attributes,
            _ => return None,
        };
        attributes.iter().find_map(|attr| match attr {
            AttributeContent::Property(prop) if prop.name == name => match &prop.value {
                Some(AttributeValue::Literal(value)) => Some(value.clone()),
                _ => None,
            },
            _ => None,
        })
    }

    #[test]
    fn slugs_are_stable() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("API_v2 - Intro"), "api-v2-intro");
    }

    #[test]
    fn heading_ids_dedupe() {
        let mut tree = parse("# Intro\n\n## Intro\n");
        HeadingIdsPlugin.transform(&mut tree, None).unwrap();
        let children = tree.children().unwrap();
        assert_eq!(attribute(&children[0], "id").as_deref(), Some("intro"));
        assert_eq!(attribute(&children[1], "id").as_deref(), Some("intro-1"));
    }

    #[test]
    fn external_links_only_touch_absolute_urls() {
        let mut tree = parse("[a](https://x.dev) and [b](./local)\n");
        ExternalLinksPlugin.transform(&mut tree, None).unwrap();
        let paragraph = &tree.children().unwrap()[0];
        let inline = paragraph.children().unwrap();
        assert_eq!(attribute(&inline[0], "rel").as_deref(), Some("noopener noreferrer"));
        assert!(matches!(inline[2], Node::Link(_)));
    }

    #[test]
    fn load_collects_errors_and_keeps_going() {
        let registry = PluginRegistry::with_builtins();
        let specs = vec![
            PluginSpec::Name("missing".into()),
            PluginSpec::WithOptions("heading-ids".into(), json!({"bogus": 1})),
            PluginSpec::WithOptions("external-links".into(), json!({"target": null})),
        ];
        let (loaded, errors) = registry.load_plugins(&specs, SecurityMode::Trusted);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "external-links");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].name, "missing");
    }

    #[test]
    fn safe_mode_loads_nothing() {
        let registry = PluginRegistry::with_builtins();
        let (loaded, errors) =
            registry.load_plugins(&[PluginSpec::Name("heading-ids".into())], SecurityMode::Safe);
        assert!(loaded.is_empty());
        assert!(errors.is_empty());
    }
}
