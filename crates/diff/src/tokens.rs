//! Token-level diff of two declarations.

use apicat_model::{MarkupToken, TokenKind};
use derive_more::Display;

const DELETE_COST: usize = 1;
const INSERT_COST: usize = 1;
const SUBSTITUTE_COST: usize = 2;

/// What happened to one token going from left to right.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffOp {
    #[display("unchanged")]
    Unchanged,
    #[display("added")]
    Added,
    #[display("removed")]
    Removed,
}

impl DiffOp {
    pub fn marker(self) -> char {
        match self {
            DiffOp::Unchanged => ' ',
            DiffOp::Added => '+',
            DiffOp::Removed => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffToken {
    pub op: DiffOp,
    pub token: MarkupToken,
    line_leading: bool,
}

impl DiffToken {
    /// The operation to display. Whitespace at the start of a line is never
    /// highlighted, so re-indentation does not show up as a change.
    pub fn highlight(&self) -> DiffOp {
        if self.line_leading { DiffOp::Unchanged } else { self.op }
    }

    pub fn is_line_leading(&self) -> bool {
        self.line_leading
    }
}

/// Marks whitespace tokens that begin a rendered line, either by following a
/// line break or by carrying one followed only by indentation.
fn line_leading(tokens: &[MarkupToken]) -> Vec<bool> {
    let mut at_line_start = true;
    tokens
        .iter()
        .map(|token| {
            let breaks_line = token
                .text
                .rsplit_once('\n')
                .is_some_and(|(_, indent)| indent.chars().all(char::is_whitespace));
            let leading = token.kind == TokenKind::Whitespace && (at_line_start || breaks_line);
            if !token.text.is_empty() {
                at_line_start = token.text.ends_with('\n');
            }
            leading
        })
        .collect()
}

/// Minimal edit script turning `left` into `right`.
///
/// Deleting or inserting a token costs 1 and substituting one costs 2. Where a
/// substitution ties with a delete plus insert, the substitution is taken and
/// emitted as the removed token followed by the added one.
pub fn diff_tokens(left: &[MarkupToken], right: &[MarkupToken]) -> Vec<DiffToken> {
    let (n, m) = (left.len(), right.len());
    let width = m + 1;
    let mut cost = vec![0usize; (n + 1) * width];
    for i in 0..=n {
        cost[i * width] = i * DELETE_COST;
    }
    for j in 0..=m {
        cost[j] = j * INSERT_COST;
    }
    for i in 1..=n {
        for j in 1..=m {
            let diagonal = cost[(i - 1) * width + j - 1];
            let substitute = if left[i - 1] == right[j - 1] { diagonal } else { diagonal + SUBSTITUTE_COST };
            let delete = cost[(i - 1) * width + j] + DELETE_COST;
            let insert = cost[i * width + j - 1] + INSERT_COST;
            cost[i * width + j] = substitute.min(delete).min(insert);
        }
    }

    let leading_left = line_leading(left);
    let leading_right = line_leading(right);
    let removed = |i: usize| DiffToken { op: DiffOp::Removed, token: left[i].clone(), line_leading: leading_left[i] };
    let added = |j: usize| DiffToken { op: DiffOp::Added, token: right[j].clone(), line_leading: leading_right[j] };

    // Walk back from the end; the script comes out reversed.
    let mut script = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let here = cost[i * width + j];
        if i > 0 && j > 0 {
            let diagonal = cost[(i - 1) * width + j - 1];
            if left[i - 1] == right[j - 1] && here == diagonal {
                script.push(DiffToken {
                    op: DiffOp::Unchanged,
                    token: right[j - 1].clone(),
                    line_leading: leading_right[j - 1],
                });
                i -= 1;
                j -= 1;
                continue;
            }
            if left[i - 1] != right[j - 1] && here == diagonal + SUBSTITUTE_COST {
                script.push(added(j - 1));
                script.push(removed(i - 1));
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && here == cost[(i - 1) * width + j] + DELETE_COST {
            script.push(removed(i - 1));
            i -= 1;
        } else {
            script.push(added(j - 1));
            j -= 1;
        }
    }
    script.reverse();
    script
}
