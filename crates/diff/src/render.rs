//! Line-oriented text rendering of a [`CatalogDiff`].
//!
//! Every line starts with a one character marker (`+`, `-` or a space)
//! followed by indentation. Containers wrap their children in braces.

use crate::error::{ErrorKind, Result};
use crate::tree::{CatalogDiff, DiffKind};
use apicat_store::{ApiId, Declaration};
use exn::ResultExt;
use std::fmt::Write;

const DEFAULT_INDENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Leave out subtrees without any difference.
    pub exclude_unchanged: bool,
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { exclude_unchanged: false, indent: DEFAULT_INDENT }
    }
}

enum Frame {
    Open(ApiId, usize),
    Close(char, usize),
}

impl CatalogDiff<'_> {
    /// Renders the whole diff.
    pub fn render(&self, options: DiffOptions) -> Result<String> {
        self.render_from(self.roots(), options)
    }

    /// Renders the subtree rooted at `api`, which starts unindented.
    pub fn render_subtree(&self, api: ApiId, options: DiffOptions) -> Result<String> {
        self.render_from(&[api], options)
    }

    fn render_from(&self, roots: &[ApiId], options: DiffOptions) -> Result<String> {
        let mut out = String::new();
        let mut stack: Vec<Frame> = roots.iter().rev().map(|&root| Frame::Open(root, 0)).collect();
        while let Some(frame) = stack.pop() {
            let (id, depth) = match frame {
                Frame::Open(id, depth) => (id, depth),
                Frame::Close(marker, depth) => {
                    line(&mut out, marker, depth * options.indent, "}");
                    continue;
                },
            };
            let Some(node) = self.node(id) else {
                continue;
            };
            if options.exclude_unchanged && !node.has_diff {
                continue;
            }
            let pad = depth * options.indent;
            match node.kind {
                DiffKind::None => declaration(&mut out, ' ', pad, node.right.or(node.left))?,
                DiffKind::Added => declaration(&mut out, '+', pad, node.right)?,
                DiffKind::Removed => declaration(&mut out, '-', pad, node.left)?,
                DiffKind::Changed => {
                    declaration(&mut out, '-', pad, node.left)?;
                    declaration(&mut out, '+', pad, node.right)?;
                },
            }

            let children: Vec<ApiId> = node
                .children
                .iter()
                .copied()
                .filter(|&child| !options.exclude_unchanged || self.has_diff(child))
                .collect();
            if children.is_empty() {
                continue;
            }
            let marker = node.kind.marker();
            line(&mut out, marker, pad, "{");
            stack.push(Frame::Close(marker, depth));
            stack.extend(children.into_iter().rev().map(|child| Frame::Open(child, depth + 1)));
        }
        Ok(out)
    }
}

fn line(out: &mut String, marker: char, pad: usize, text: &str) {
    _ = writeln!(out, "{marker}{:pad$}{text}", "");
}

fn declaration(out: &mut String, marker: char, pad: usize, declaration: Option<Declaration<'_>>) -> Result<()> {
    let Some(declaration) = declaration else {
        return Ok(());
    };
    let markup = declaration.markup().or_raise(|| ErrorKind::Markup)?;
    for text in markup.lines() {
        line(out, marker, pad, &text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, api};
    use apicat_store::{FrameworkSurface, PackageSurface};
    use rstest::rstest;

    const FRAMEWORKS: &str = "
 namespace N
 {
     public class T
     {
-        public void M();
+        public int M();
+        public int P { get; }
     }
-    public class U
 }
";

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn renders_framework_diff(#[case] exclude_unchanged: bool) {
        let catalog = fixtures::catalog();
        let left = FrameworkSurface::new(catalog.framework("net8.0").unwrap());
        let right = FrameworkSurface::new(catalog.framework("net9.0").unwrap());
        let diff = CatalogDiff::new(&left, &right).unwrap();
        let text = diff.render(DiffOptions { exclude_unchanged, ..DiffOptions::default() }).unwrap();
        assert_eq!(text, FRAMEWORKS.trim_start_matches('\n'));
    }

    #[test]
    fn unchanged_members_are_pruned() {
        let catalog = fixtures::catalog();
        let framework = catalog.framework("net8.0").unwrap();
        let package = catalog.package("Contoso.Lib", "1.0.0").unwrap();
        let left = FrameworkSurface::new(framework);
        let right = PackageSurface::new(package, Some(framework.id()));
        let diff = CatalogDiff::new(&left, &right).unwrap();
        let class = catalog.api_by_fingerprint(api("T:N.T")).unwrap().id();

        let full = diff.render_subtree(class, DiffOptions { exclude_unchanged: false, indent: 2 }).unwrap();
        assert_eq!(full, " public class T\n {\n   public void M();\n+  public void M(int);\n }\n");
        let pruned = diff.render_subtree(class, DiffOptions { exclude_unchanged: true, indent: 2 }).unwrap();
        assert_eq!(pruned, " public class T\n {\n+  public void M(int);\n }\n");
    }

    #[test]
    fn unchanged_subtrees_render_nothing_when_excluded() {
        let catalog = fixtures::catalog();
        let left = FrameworkSurface::new(catalog.framework("net8.0").unwrap());
        let diff = CatalogDiff::new(&left, &left).unwrap();
        let options = DiffOptions { exclude_unchanged: true, ..DiffOptions::default() };
        assert_eq!(diff.render(options).unwrap(), "");
        assert!(diff.render(DiffOptions::default()).unwrap().starts_with(" namespace N\n {\n"));
    }
}
