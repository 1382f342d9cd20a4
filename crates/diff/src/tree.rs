//! Structural diff of the api tree between two surfaces.

use crate::error::{ErrorKind, Result};
use crate::tokens::{DiffToken, diff_tokens};
use apicat_store::{Api, ApiId, ApiSurface, Catalog, Declaration};
use derive_more::Display;
use exn::ResultExt;
use tracing::{debug, instrument};

/// How one api differs between the left and the right surface.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DiffKind {
    /// Identical on both sides.
    #[default]
    #[display("none")]
    None,
    /// Only on the right.
    #[display("added")]
    Added,
    /// Only on the left.
    #[display("removed")]
    Removed,
    /// On both sides with different markup.
    #[display("changed")]
    Changed,
}

impl DiffKind {
    pub fn marker(self) -> char {
        match self {
            DiffKind::None | DiffKind::Changed => ' ',
            DiffKind::Added => '+',
            DiffKind::Removed => '-',
        }
    }
}

/// Added, removed and changed apis under a subtree.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
#[display("{added} added, {removed} removed, {changed} changed")]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }
}

#[derive(Debug)]
pub(crate) struct Node<'a> {
    pub kind: DiffKind,
    pub left: Option<Declaration<'a>>,
    pub right: Option<Declaration<'a>>,
    /// Visited children, in tree order.
    pub children: Vec<ApiId>,
    /// This node or anything beneath it differs.
    pub has_diff: bool,
    pub tokens: Option<Vec<DiffToken>>,
}

/// The difference between two surfaces of one catalog.
///
/// Apis declared on neither side are not part of the diff. Accessors are
/// never visited on their own: they count towards their property or event.
#[derive(Debug)]
pub struct CatalogDiff<'a> {
    catalog: &'a Catalog,
    nodes: Vec<Option<Node<'a>>>,
    roots: Vec<ApiId>,
}

fn same_markup(left: Option<Declaration<'_>>, right: Option<Declaration<'_>>) -> bool {
    left.map(|declaration| declaration.markup_index()) == right.map(|declaration| declaration.markup_index())
}

impl<'a> CatalogDiff<'a> {
    #[instrument(skip_all, fields(apis = left.catalog().apis().len()))]
    pub fn new<L, R>(left: &L, right: &R) -> Result<Self>
    where
        L: ApiSurface<'a>,
        R: ApiSurface<'a>,
    {
        let catalog = left.catalog();
        if !std::ptr::eq(catalog, right.catalog()) {
            exn::bail!(ErrorKind::CatalogMismatch);
        }

        let mut nodes: Vec<Option<Node<'a>>> = std::iter::repeat_with(|| None).take(catalog.apis().len()).collect();
        let mut roots = Vec::new();
        // Pre-order; reversed below to settle `has_diff` bottom-up.
        let mut visited = Vec::new();
        let mut stack: Vec<(Option<ApiId>, Api<'a>)> = catalog.roots().map(|api| (None, api)).collect();
        stack.reverse();
        while let Some((parent, api)) = stack.pop() {
            let (l, r) = (left.declaration(api.id()), right.declaration(api.id()));
            // Undeclared apis are passed through: their declared descendants
            // hang off the nearest declared ancestor.
            let mut owner = parent;
            if l.is_some() || r.is_some() {
                let kind = match (l, r) {
                    (Some(_), None) => DiffKind::Removed,
                    (None, Some(_)) => DiffKind::Added,
                    _ if !same_markup(l, r) || accessors_differ(api, left, right) => DiffKind::Changed,
                    _ => DiffKind::None,
                };
                let tokens = match (kind, l, r) {
                    (DiffKind::Changed, Some(l), Some(r)) => {
                        let l = l.markup().or_raise(|| ErrorKind::Markup)?;
                        let r = r.markup().or_raise(|| ErrorKind::Markup)?;
                        Some(diff_tokens(l.tokens(), r.tokens()))
                    },
                    _ => None,
                };
                let has_diff = kind != DiffKind::None;
                nodes[api.id().index()] =
                    Some(Node { kind, left: l, right: r, children: Vec::new(), has_diff, tokens });
                match parent {
                    Some(parent) => {
                        if let Some(node) = nodes[parent.index()].as_mut() {
                            node.children.push(api.id());
                        }
                    },
                    None => roots.push(api.id()),
                }
                visited.push(api.id());
                owner = Some(api.id());
            }
            if api.kind().can_have_children() {
                let children: Vec<Api<'a>> = api.children().filter(|child| !child.kind().is_accessor()).collect();
                stack.extend(children.into_iter().rev().map(|child| (owner, child)));
            }
        }

        for &id in visited.iter().rev() {
            let Some(node) = nodes[id.index()].as_ref() else {
                continue;
            };
            let below = node.children.iter().any(|child| nodes[child.index()].as_ref().is_some_and(|child| child.has_diff));
            if below && let Some(node) = nodes[id.index()].as_mut() {
                node.has_diff = true;
            }
        }
        debug!(visited = visited.len(), "diff computed");
        Ok(Self { catalog, nodes, roots })
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub(crate) fn node(&self, api: ApiId) -> Option<&Node<'a>> {
        self.nodes.get(api.index()).and_then(Option::as_ref)
    }

    /// Visited top-level apis, in tree order.
    pub fn roots(&self) -> &[ApiId] {
        &self.roots
    }

    /// The api's own difference. `None` for apis on neither side.
    pub fn kind(&self, api: ApiId) -> DiffKind {
        self.node(api).map(|node| node.kind).unwrap_or_default()
    }

    /// The api's own kind, or `Changed` when it is itself unchanged but
    /// something beneath it differs.
    pub fn rollup(&self, api: ApiId) -> DiffKind {
        match self.node(api) {
            Some(node) if node.kind == DiffKind::None && node.has_diff => DiffKind::Changed,
            Some(node) => node.kind,
            None => DiffKind::None,
        }
    }

    /// Whether the api or anything beneath it differs.
    pub fn has_diff(&self, api: ApiId) -> bool {
        self.node(api).is_some_and(|node| node.has_diff)
    }

    /// Token script of a `Changed` api.
    pub fn tokens(&self, api: ApiId) -> Option<&[DiffToken]> {
        self.node(api).and_then(|node| node.tokens.as_deref())
    }

    /// Counts differences in the subtree rooted at `api`, including `api`.
    pub fn summary(&self, api: ApiId) -> DiffSummary {
        let mut summary = DiffSummary::default();
        let mut stack = vec![api];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            match node.kind {
                DiffKind::None => {},
                DiffKind::Added => summary.added += 1,
                DiffKind::Removed => summary.removed += 1,
                DiffKind::Changed => summary.changed += 1,
            }
            if node.has_diff {
                stack.extend(node.children.iter().copied());
            }
        }
        summary
    }

    /// Counts every difference in the diff.
    pub fn total(&self) -> DiffSummary {
        self.roots.iter().fold(DiffSummary::default(), |total, &root| {
            let summary = self.summary(root);
            DiffSummary {
                added: total.added + summary.added,
                removed: total.removed + summary.removed,
                changed: total.changed + summary.changed,
            }
        })
    }
}

/// Accessors are folded into their owner: a property whose getter or setter
/// differs is changed even if its own markup is not.
fn accessors_differ<'a>(api: Api<'a>, left: &impl ApiSurface<'a>, right: &impl ApiSurface<'a>) -> bool {
    api.kind().has_accessors()
        && api
            .children()
            .filter(|child| child.kind().is_accessor())
            .any(|child| !same_markup(left.declaration(child.id()), right.declaration(child.id())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, api};
    use crate::tokens::DiffOp;
    use apicat_model::MarkupToken;
    use apicat_store::{FrameworkSurface, PackageSurface};
    use std::collections::HashMap;

    fn id(catalog: &Catalog, canonical: &str) -> ApiId {
        catalog.api_by_fingerprint(api(canonical)).unwrap().id()
    }

    fn frameworks(catalog: &Catalog) -> (FrameworkSurface<'_>, FrameworkSurface<'_>) {
        (
            FrameworkSurface::new(catalog.framework("net8.0").unwrap()),
            FrameworkSurface::new(catalog.framework("net9.0").unwrap()),
        )
    }

    #[test]
    fn classifies_every_declared_api() {
        let catalog = fixtures::catalog();
        let (net8, net9) = frameworks(&catalog);
        let diff = CatalogDiff::new(&net8, &net9).unwrap();

        assert_eq!(diff.kind(id(&catalog, "N:N")), DiffKind::None);
        assert_eq!(diff.rollup(id(&catalog, "N:N")), DiffKind::Changed);
        assert_eq!(diff.kind(id(&catalog, "T:N.T")), DiffKind::None);
        assert_eq!(diff.rollup(id(&catalog, "T:N.T")), DiffKind::Changed);
        assert_eq!(diff.kind(id(&catalog, "M:N.T.M")), DiffKind::Changed);
        assert_eq!(diff.kind(id(&catalog, "P:N.T.P")), DiffKind::Added);
        assert_eq!(diff.kind(id(&catalog, "T:N.U")), DiffKind::Removed);
        assert!(!diff.has_diff(id(&catalog, "M:N.T.M(System.Int32)")));
        assert!(!diff.has_diff(id(&catalog, "M:N.T.get_P")));

        let summary = diff.summary(id(&catalog, "N:N"));
        assert_eq!(summary, DiffSummary { added: 1, removed: 1, changed: 1 });
        assert_eq!(summary.to_string(), "1 added, 1 removed, 1 changed");
        assert_eq!(diff.summary(id(&catalog, "T:N.T")), DiffSummary { added: 1, removed: 0, changed: 1 });
        assert_eq!(diff.total(), summary);
        assert_eq!(diff.roots(), &[id(&catalog, "N:N")]);
    }

    #[test]
    fn identical_surfaces_have_no_diff() {
        let catalog = fixtures::catalog();
        let (net8, _) = frameworks(&catalog);
        let diff = CatalogDiff::new(&net8, &net8).unwrap();
        for canonical in ["N:N", "T:N.T", "M:N.T.M", "T:N.U"] {
            assert_eq!(diff.rollup(id(&catalog, canonical)), DiffKind::None, "{canonical}");
        }
        assert!(diff.total().is_empty());
    }

    #[test]
    fn changed_declarations_carry_a_token_script() {
        let catalog = fixtures::catalog();
        let (net8, net9) = frameworks(&catalog);
        let diff = CatalogDiff::new(&net8, &net9).unwrap();
        let method = id(&catalog, "M:N.T.M");
        let script = diff.tokens(method).unwrap();

        let accepted: Vec<MarkupToken> =
            script.iter().filter(|token| token.op != DiffOp::Removed).map(|token| token.token.clone()).collect();
        let rejected: Vec<MarkupToken> =
            script.iter().filter(|token| token.op != DiffOp::Added).map(|token| token.token.clone()).collect();
        let right = net9.declaration(method).unwrap().markup().unwrap();
        let left = net8.declaration(method).unwrap().markup().unwrap();
        assert_eq!(accepted, right.tokens());
        assert_eq!(rejected, left.tokens());

        let changed: Vec<(DiffOp, &str)> = script
            .iter()
            .filter(|token| token.op != DiffOp::Unchanged)
            .map(|token| (token.op, token.token.text.as_str()))
            .collect();
        assert_eq!(changed, vec![(DiffOp::Removed, "void"), (DiffOp::Added, "int")]);
        assert!(diff.tokens(id(&catalog, "T:N.T")).is_none());
    }

    #[test]
    fn package_overload_is_added() {
        let catalog = fixtures::catalog();
        let framework = catalog.framework("net8.0").unwrap();
        let package = catalog.package("Contoso.Lib", "1.0.0").unwrap();
        let left = FrameworkSurface::new(framework);
        let right = PackageSurface::new(package, Some(framework.id()));
        let diff = CatalogDiff::new(&left, &right).unwrap();

        let class = catalog.api_by_fingerprint(api("T:N.T")).unwrap();
        assert_eq!(class.children().len(), 3);
        assert_eq!(diff.rollup(class.id()), DiffKind::Changed);
        assert_eq!(diff.kind(id(&catalog, "M:N.T.M")), DiffKind::None);
        assert_eq!(diff.kind(id(&catalog, "M:N.T.M(System.Int32)")), DiffKind::Added);
    }

    /// Replaces individual declarations of another surface.
    struct Patched<'a, S> {
        inner: S,
        overrides: HashMap<ApiId, Declaration<'a>>,
    }

    impl<'a, S: ApiSurface<'a>> ApiSurface<'a> for Patched<'a, S> {
        fn catalog(&self) -> &'a Catalog {
            self.inner.catalog()
        }

        fn declaration(&self, api: ApiId) -> Option<Declaration<'a>> {
            self.overrides.get(&api).copied().or_else(|| self.inner.declaration(api))
        }
    }

    #[test]
    fn accessors_are_folded_into_their_owner() {
        let catalog = fixtures::catalog();
        let (_, net9) = frameworks(&catalog);
        let getter = id(&catalog, "M:N.T.get_P");
        let property = id(&catalog, "P:N.T.P");
        let unrelated = net9.declaration(id(&catalog, "N:N")).unwrap();
        let patched = Patched {
            inner: FrameworkSurface::new(catalog.framework("net9.0").unwrap()),
            overrides: HashMap::from([(getter, unrelated)]),
        };
        let diff = CatalogDiff::new(&net9, &patched).unwrap();
        assert_eq!(diff.kind(property), DiffKind::Changed);
        assert!(diff.tokens(property).unwrap().iter().all(|token| token.op == DiffOp::Unchanged));
        assert!(!diff.has_diff(getter));
        assert_eq!(diff.total(), DiffSummary { added: 0, removed: 0, changed: 1 });
    }

    #[test]
    fn surfaces_must_share_a_catalog() {
        let first = fixtures::catalog();
        let second = fixtures::catalog();
        let (left, _) = frameworks(&first);
        let (_, right) = frameworks(&second);
        let err = CatalogDiff::new(&left, &right).unwrap_err();
        assert_eq!(*err, ErrorKind::CatalogMismatch);
    }
}
