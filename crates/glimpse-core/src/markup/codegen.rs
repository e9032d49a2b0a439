//! mdast to JSX module text.
//!
//! The output is JSX (not runtime calls); the script transform lowers it.
//! Text and attribute literals are emitted as JSON strings inside braces so
//! no JSX text escaping is needed.

use markdown::mdast::{AttributeContent, AttributeValue, Node};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Declaration, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;
use rustc_hash::FxHashSet;
use serde_json::Value;

/// Render `tree` as an ES module whose default export is the content function.
pub fn module_from_tree(tree: &Node, frontmatter: Option<&Value>) -> String {
    let mut ctx = Context::default();
    let mut body = String::new();
    if let Node::Root(root) = tree {
        for child in &root.children {
            if let Node::MdxjsEsm(esm) = child {
                ctx.esm.push(esm.value.clone());
            } else {
                ctx.node(child, &mut body);
            }
        }
    } else {
        ctx.node(tree, &mut body);
    }

    let esm = ctx.esm.join("\n");
    let declared = declared_names(&esm);
    let mut provided: Vec<&String> = ctx
        .components
        .iter()
        .filter(|name| !declared.contains(name.as_str()))
        .collect();
    provided.sort();

    let mut out = String::new();
    if !esm.is_empty() {
        out.push_str(&esm);
        out.push('\n');
    }
    let frontmatter = frontmatter.cloned().unwrap_or(Value::Object(Default::default()));
    out.push_str(&format!("export const frontmatter = {frontmatter};\n"));
    out.push_str("export default function MDXContent(props = {}) {\n");
    out.push_str("  const _components = { ...props.components };\n");
    if !provided.is_empty() {
        let names: Vec<&str> = provided.iter().map(|s| s.as_str()).collect();
        out.push_str(&format!("  const {{ {} }} = _components;\n", names.join(", ")));
    }
    out.push_str(&format!("  return <>{body}</>;\n}}\n"));
    out
}

#[derive(Default)]
struct Context {
    esm: Vec<String>,
    /// Capitalized component roots referenced by JSX tags.
    components: FxHashSet<String>,
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

impl Context {
    fn children(&mut self, nodes: &[Node], out: &mut String) {
        for node in nodes {
            self.node(node, out);
        }
    }

    fn element(&mut self, tag: &str, attrs: &[(&str, String)], children: &[Node], out: &mut String) {
        out.push('<');
        out.push_str(tag);
        for (name, value) in attrs {
            out.push_str(&format!(" {name}={{{value}}}"));
        }
        if children.is_empty() && is_void(tag) {
            out.push_str(" />");
            return;
        }
        out.push('>');
        self.children(children, out);
        out.push_str(&format!("</{tag}>"));
    }

    fn text_element(&mut self, tag: &str, attrs: &[(&str, String)], text: &str, out: &mut String) {
        out.push_str(&format!("<{tag}"));
        for (name, value) in attrs {
            out.push_str(&format!(" {name}={{{value}}}"));
        }
        out.push_str(&format!(">{{{}}}</{tag}>", js_string(text)));
    }

    fn jsx(&mut self, name: Option<&str>, attributes: &[AttributeContent], children: &[Node], out: &mut String) {
        let tag = name.unwrap_or("");
        if let Some(root) = tag.split('.').next() {
            if root.starts_with(|c: char| c.is_ascii_uppercase()) {
                self.components.insert(root.to_string());
            }
        }
        out.push('<');
        out.push_str(tag);
        for attribute in attributes {
            match attribute {
                AttributeContent::Property(prop) => match &prop.value {
                    None => out.push_str(&format!(" {}", prop.name)),
                    Some(AttributeValue::Literal(value)) => {
                        out.push_str(&format!(" {}={{{}}}", prop.name, js_string(value)))
                    }
                    Some(AttributeValue::Expression(expr)) => {
                        out.push_str(&format!(" {}={{{}}}", prop.name, expr.value))
                    }
                },
                AttributeContent::Expression(expr) => {
                    let value = expr.value.trim();
                    if value.starts_with("...") {
                        out.push_str(&format!(" {{{value}}}"));
                    } else {
                        out.push_str(&format!(" {{...{value}}}"));
                    }
                }
            }
        }
        if children.is_empty() && !tag.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        self.children(children, out);
        out.push_str(&format!("</{tag}>"));
    }

    fn node(&mut self, node: &Node, out: &mut String) {
        match node {
            Node::Root(root) => self.children(&root.children, out),
            Node::MdxjsEsm(esm) => self.esm.push(esm.value.clone()),
            Node::Yaml(_) | Node::Toml(_) | Node::Definition(_) | Node::Html(_) => {}
            Node::Text(text) => out.push_str(&format!("{{{}}}", js_string(&text.value))),
            Node::Paragraph(p) => self.element("p", &[], &p.children, out),
            Node::Heading(h) => self.element(&format!("h{}", h.depth), &[], &h.children, out),
            Node::Blockquote(q) => self.element("blockquote", &[], &q.children, out),
            Node::List(list) => {
                if list.ordered {
                    let attrs: Vec<(&str, String)> = match list.start {
                        Some(start) if start != 1 => vec![("start", start.to_string())],
                        _ => Vec::new(),
                    };
                    self.element("ol", &attrs, &list.children, out);
                } else {
                    self.element("ul", &[], &list.children, out);
                }
            }
            Node::ListItem(item) => {
                out.push_str("<li>");
                if let Some(checked) = item.checked {
                    out.push_str(&format!(
                        "<input type=\"checkbox\" checked={{{checked}}} disabled />"
                    ));
                }
                // Tight list items render their paragraph content inline.
                for child in &item.children {
                    match child {
                        Node::Paragraph(p) if !item.spread => self.children(&p.children, out),
                        other => self.node(other, out),
                    }
                }
                out.push_str("</li>");
            }
            Node::Code(code) => {
                let attrs: Vec<(&str, String)> = code
                    .lang
                    .as_ref()
                    .map(|lang| vec![("className", js_string(&format!("language-{lang}")))])
                    .unwrap_or_default();
                out.push_str("<pre>");
                self.text_element("code", &attrs, &code.value, out);
                out.push_str("</pre>");
            }
            Node::InlineCode(code) => self.text_element("code", &[], &code.value, out),
            Node::Math(math) => self.text_element(
                "div",
                &[("className", js_string("math math-display"))],
                &math.value,
                out,
            ),
            Node::InlineMath(math) => self.text_element(
                "span",
                &[("className", js_string("math math-inline"))],
                &math.value,
                out,
            ),
            Node::Emphasis(e) => self.element("em", &[], &e.children, out),
            Node::Strong(s) => self.element("strong", &[], &s.children, out),
            Node::Delete(d) => self.element("del", &[], &d.children, out),
            Node::Break(_) => out.push_str("<br />"),
            Node::ThematicBreak(_) => out.push_str("<hr />"),
            Node::Link(link) => {
                let mut attrs = vec![("href", js_string(&link.url))];
                if let Some(title) = &link.title {
                    attrs.push(("title", js_string(title)));
                }
                self.element("a", &attrs, &link.children, out);
            }
            Node::Image(image) => {
                let mut attrs = vec![("src", js_string(&image.url)), ("alt", js_string(&image.alt))];
                if let Some(title) = &image.title {
                    attrs.push(("title", js_string(title)));
                }
                self.element("img", &attrs, &[], out);
            }
            Node::ImageReference(image) => out.push_str(&format!("{{{}}}", js_string(&image.alt))),
            Node::LinkReference(link) => self.element("span", &[], &link.children, out),
            Node::FootnoteReference(footnote) => {
                let id = js_string(&format!("#fn-{}", footnote.identifier));
                out.push_str(&format!(
                    "<sup><a href={{{id}}}>{{{}}}</a></sup>",
                    js_string(&footnote.identifier)
                ));
            }
            Node::FootnoteDefinition(footnote) => {
                let id = js_string(&format!("fn-{}", footnote.identifier));
                self.element("div", &[("id", id)], &footnote.children, out);
            }
            Node::Table(table) => {
                out.push_str("<table>");
                for (index, row) in table.children.iter().enumerate() {
                    let (section, cell) = if index == 0 { ("thead", "th") } else { ("tbody", "td") };
                    if index <= 1 {
                        if index == 1 {
                            out.push_str("</thead>");
                        }
                        out.push_str(&format!("<{section}>"));
                    }
                    out.push_str("<tr>");
                    if let Some(cells) = row.children() {
                        for c in cells {
                            let children = c.children().map(Vec::as_slice).unwrap_or_default();
                            self.element(cell, &[], children, out);
                        }
                    }
                    out.push_str("</tr>");
                }
                match table.children.len() {
                    0 => {}
                    1 => out.push_str("</thead>"),
                    _ => out.push_str("</tbody>"),
                }
                out.push_str("</table>");
            }
            Node::TableRow(row) => self.element("tr", &[], &row.children, out),
            Node::TableCell(cell) => self.element("td", &[], &cell.children, out),
            Node::MdxFlowExpression(expr) => out.push_str(&format!("{{{}}}", expr.value)),
            Node::MdxTextExpression(expr) => out.push_str(&format!("{{{}}}", expr.value)),
            Node::MdxJsxFlowElement(el) => self.jsx(el.name.as_deref(), &el.attributes, &el.children, out),
            Node::MdxJsxTextElement(el) => self.jsx(el.name.as_deref(), &el.attributes, &el.children, out),
            other => {
                if let Some(children) = other.children() {
                    self.children(children, out);
                }
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "img" | "br" | "hr" | "input")
}

/// Names bound by the document's own import/export statements.
fn declared_names(esm: &str) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    if esm.trim().is_empty() {
        return names;
    }
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, esm, SourceType::mjs().with_jsx(true)).parse();
    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                for specifier in decl.specifiers.iter().flatten() {
                    names.insert(specifier.local().name.to_string());
                }
            }
            Statement::ExportNamedDeclaration(decl) => match &decl.declaration {
                Some(Declaration::VariableDeclaration(var)) => {
                    for declarator in &var.declarations {
                        if let Some(id) = declarator.id.get_binding_identifier() {
                            names.insert(id.name.to_string());
                        }
                    }
                }
                Some(Declaration::FunctionDeclaration(func)) => {
                    if let Some(id) = &func.id {
                        names.insert(id.name.to_string());
                    }
                }
                Some(Declaration::ClassDeclaration(class)) => {
                    if let Some(id) = &class.id {
                        names.insert(id.name.to_string());
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    names
}
