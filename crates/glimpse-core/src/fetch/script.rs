//! Script transform and import extraction.

use indexmap::IndexSet;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration, ImportExpression,
    ModuleDeclaration,
};
use oxc_ast_visit::{Visit, walk};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{PreviewError, Result};

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*['"`]([^'"`\n]+)['"`]\s*\)"#).expect("require pattern is valid")
});

/// Transformed code and the specifiers it imports, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedScript {
    pub code: String,
    pub imports: IndexSet<String>,
}

fn source_type_for(path: &Path) -> SourceType {
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
    if matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md" | "mdx" | "markdown")
    ) {
        return SourceType::mjs().with_jsx(true);
    }
    source_type
}

/// Strip types, lower JSX, print, and collect imports.
pub fn transform(source: &str, path: &Path) -> Result<TransformedScript> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type_for(path)).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(PreviewError::transform(path, error.message.to_string()));
    }
    let mut program = parsed.program;

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let options = TransformOptions::default();
    let transformed = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if let Some(error) = transformed.errors.first() {
        return Err(PreviewError::transform(path, error.message.to_string()));
    }

    let mut collector = ImportCollector::default();
    collector.visit_program(&program);
    let code = Codegen::new().build(&program).code;

    let imports = if collector.specifiers.is_empty() {
        require_calls(&code)
    } else {
        collector.specifiers
    };
    Ok(TransformedScript { code, imports })
}

/// Permissive `require("...")` text scan. May also match inside strings and
/// comments; used only when static analysis finds nothing.
pub fn require_calls(code: &str) -> IndexSet<String> {
    REQUIRE_CALL
        .captures_iter(code)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Default)]
struct ImportCollector {
    specifiers: IndexSet<String>,
}

impl<'a> Visit<'a> for ImportCollector {
    fn visit_module_declaration(&mut self, decl: &ModuleDeclaration<'a>) {
        match decl {
            ModuleDeclaration::ImportDeclaration(import) => self.import(import),
            ModuleDeclaration::ExportAllDeclaration(export) => self.export_all(export),
            ModuleDeclaration::ExportNamedDeclaration(export) => self.export_named(export),
            _ => {}
        }
        walk::walk_module_declaration(self, decl);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &expr.source {
            self.specifiers.insert(literal.value.to_string());
        }
        walk::walk_import_expression(self, expr);
    }
}

impl ImportCollector {
    fn import(&mut self, import: &ImportDeclaration<'_>) {
        self.specifiers.insert(import.source.value.to_string());
    }

    fn export_all(&mut self, export: &ExportAllDeclaration<'_>) {
        self.specifiers.insert(export.source.value.to_string());
    }

    fn export_named(&mut self, export: &ExportNamedDeclaration<'_>) {
        if let Some(source) = &export.source {
            self.specifiers.insert(source.value.to_string());
        }
    }
}
