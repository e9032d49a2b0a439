//! Document markup compilation.
//!
//! [`MarkupCompiler`] is the seam to the markup toolchain. Safe evaluation
//! only ever calls [`MarkupCompiler::render_safe`]; Trusted evaluation calls
//! [`MarkupCompiler::compile_module`] with the loaded plugins.

mod codegen;
pub mod plugins;

use markdown::mdast::Node;
use markdown::{CompileOptions, MdxSignal, Options, ParseOptions};
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde_json::Value;
use std::path::Path;

use crate::error::{PreviewError, Result};

pub use codegen::module_from_tree;
pub use plugins::{LoadedPlugin, MarkupPlugin, PluginLoadError, PluginRegistry};

/// Sources above this size are refused.
pub const MAX_SOURCE_SIZE: usize = 10 * 1024 * 1024;

pub trait MarkupCompiler: Send + Sync + std::fmt::Debug {
    /// Static HTML. Embedded ESM, expressions and component tags are dropped.
    fn render_safe(&self, source: &str, path: &Path) -> Result<String>;

    /// A JSX module whose default export renders the document.
    fn compile_module(&self, source: &str, path: &Path, plugins: &[LoadedPlugin]) -> Result<String>;
}

/// MDX + GFM + frontmatter on top of the `markdown` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct MdxCompiler;

fn parse_options() -> ParseOptions {
    let mut options = ParseOptions::mdx();
    options.mdx_esm_parse = Some(Box::new(validate_esm_syntax));
    options.constructs.frontmatter = true;
    options.constructs.gfm_strikethrough = true;
    options.constructs.gfm_table = true;
    options.constructs.gfm_task_list_item = true;
    options.constructs.gfm_autolink_literal = true;
    options.constructs.gfm_footnote_definition = true;
    options.constructs.math_text = true;
    options.constructs.math_flow = true;
    options
}

fn validate_esm_syntax(code: &str) -> MdxSignal {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs().with_jsx(true)).parse();
    match ret.errors.first() {
        None => MdxSignal::Ok,
        Some(error) => {
            let offset = error
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map_or(0, |label| label.offset());
            MdxSignal::Error(
                format!("Invalid ESM syntax: {}", error.message),
                offset,
                Box::new("esm".to_string()),
                Box::new("glimpse".to_string()),
            )
        }
    }
}

fn check_size(source: &str, path: &Path) -> Result<()> {
    if source.len() > MAX_SOURCE_SIZE {
        return Err(PreviewError::transform(
            path,
            format!("source exceeds {} bytes", MAX_SOURCE_SIZE),
        ));
    }
    Ok(())
}

/// Pull the frontmatter node out of the root, parsed to JSON.
fn take_frontmatter(tree: &mut Node, path: &Path) -> Result<Option<Value>> {
    let Some(children) = tree.children_mut() else {
        return Ok(None);
    };
    let Some(index) = children
        .iter()
        .position(|node| matches!(node, Node::Yaml(_) | Node::Toml(_)))
    else {
        return Ok(None);
    };
    match children.remove(index) {
        Node::Toml(toml) => {
            let parsed: toml::Table = toml::from_str(&toml.value)
                .map_err(|e| PreviewError::transform(path, format!("invalid TOML frontmatter: {e}")))?;
            serde_json::to_value(parsed)
                .map(Some)
                .map_err(|e| PreviewError::transform(path, e.to_string()))
        }
        Node::Yaml(yaml) => serde_saphyr::from_str::<Value>(&yaml.value)
            .map(Some)
            .map_err(|e| PreviewError::transform(path, format!("invalid YAML frontmatter: {e}"))),
        _ => Ok(None),
    }
}

impl MarkupCompiler for MdxCompiler {
    fn render_safe(&self, source: &str, path: &Path) -> Result<String> {
        check_size(source, path)?;
        let options = Options {
            parse: parse_options(),
            compile: CompileOptions::gfm(),
        };
        markdown::to_html_with_options(source, &options)
            .map_err(|message| PreviewError::transform(path, message.to_string()))
    }

    fn compile_module(&self, source: &str, path: &Path, plugins: &[LoadedPlugin]) -> Result<String> {
        check_size(source, path)?;
        let mut tree = markdown::to_mdast(source, &parse_options())
            .map_err(|message| PreviewError::transform(path, message.to_string()))?;
        let frontmatter = take_frontmatter(&mut tree, path)?;
        for plugin in plugins {
            tracing::trace!(plugin = plugin.name(), path = %path.display(), "applying plugin");
            // Applied to a copy so a failing plugin leaves no partial edits.
            let mut candidate = tree.clone();
            match plugin.apply(&mut candidate) {
                Ok(()) => tree = candidate,
                Err(err) => tracing::warn!(
                    plugin = plugin.name(),
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "plugin failed, skipped"
                ),
            }
        }
        Ok(module_from_tree(&tree, frontmatter.as_ref()))
    }
}
