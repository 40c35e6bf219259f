//! Logical constraint components: `sh:and`, `sh:or`, `sh:xone`, `sh:not` and `sh:node`.
//!
//! A subject (the focus node for node shapes, each value node for property shapes) is
//! validated against every referenced shape through a [`ShapeEvaluator`]. A reference
//! passes iff this inner validation gives no result. References are never deduplicated, so
//! `xone (S S)` fails whatever the subject: `S` passes twice or not at all.
//!
//! Evaluation is depth bounded. Going deeper than [`ShapeEvaluator::max_depth`], or
//! validating again a subject against a shape it is already being validated against, abandons
//! the combinator: the error is logged and the combinator produces no result.
//!
//! With a [`VerdictCache`], each `(subject, shape)` pair is validated once per focus node, so
//! shapes referencing the same shape many times stay linear in the number of references.

use oxrdf::{Graph, Term};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::slice;

use crate::constraints::{node_result, property_result};
use crate::model::{LogicalConstraints, NodeShape, PropertyShape, ShapeId};
use crate::report::{ConstraintComponent, ResultDetail, ValidationResult};

/// Kind of logical combinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    /// Every reference must pass.
    And,
    /// At least one reference must pass.
    Or,
    /// Exactly one reference must pass.
    Xone,
    /// The single reference must fail.
    Not,
    /// The single reference must pass.
    Node,
}

impl CombinatorKind {
    pub fn component(self) -> ConstraintComponent {
        match self {
            Self::And => ConstraintComponent::And,
            Self::Or => ConstraintComponent::Or,
            Self::Xone => ConstraintComponent::Xone,
            Self::Not => ConstraintComponent::Not,
            Self::Node => ConstraintComponent::Node,
        }
    }

    /// Is the combinator satisfied when `passed` of its `total` references pass?
    pub fn is_satisfied(self, passed: usize, total: usize) -> bool {
        match self {
            Self::And | Self::Node => passed == total,
            Self::Or => passed > 0,
            Self::Xone => passed == 1,
            Self::Not => passed == 0,
        }
    }
}

impl fmt::Display for CombinatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "sh:and",
            Self::Or => "sh:or",
            Self::Xone => "sh:xone",
            Self::Not => "sh:not",
            Self::Node => "sh:node",
        })
    }
}

/// Validates a subject against a referenced shape.
pub trait ShapeEvaluator {
    /// All the results of validating `subject` against the shape `shape`.
    ///
    /// Returns `None` if `shape` cannot be resolved. `recursion` already includes the
    /// `(subject, shape)` pair and must be passed down to nested combinators.
    fn shape_results(
        &self,
        subject: &Term,
        shape: &ShapeId,
        recursion: &Recursion<'_>,
    ) -> Option<Vec<ValidationResult>>;

    /// Maximal nesting of shape references.
    fn max_depth(&self) -> usize;
}

/// The chain of `(subject, shape)` validations currently in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recursion<'a> {
    depth: usize,
    frame: Option<Frame<'a>>,
    cache: Option<&'a VerdictCache>,
}

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    subject: &'a Term,
    shape: &'a ShapeId,
    parent: &'a Recursion<'a>,
}

impl<'a> Recursion<'a> {
    /// Starts a validation sharing the verdicts of `cache`.
    pub fn with_cache(cache: &'a VerdictCache) -> Self {
        Self {
            depth: 0,
            frame: None,
            cache: Some(cache),
        }
    }

    /// Number of shape references followed so far.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Steps into the validation of `subject` against `shape`.
    pub fn enter(&'a self, subject: &'a Term, shape: &'a ShapeId) -> Self {
        Self {
            depth: self.depth + 1,
            frame: Some(Frame {
                subject,
                shape,
                parent: self,
            }),
            cache: self.cache,
        }
    }

    fn abandon(&self) {
        if let Some(cache) = self.cache {
            cache.abandoned.set(cache.abandoned.get() + 1);
        }
    }

    /// Is `subject` already being validated against `shape`?
    pub fn is_active(&self, subject: &Term, shape: &ShapeId) -> bool {
        let mut current = self;
        while let Some(frame) = &current.frame {
            if frame.subject == subject && frame.shape == shape {
                return true;
            }
            current = frame.parent;
        }
        false
    }
}

/// Verdicts of the references already followed while validating one focus node.
///
/// A verdict reached without abandoning any combinator is reused everywhere. Otherwise it
/// depends on the remaining depth and is only reused at the depth it was computed at.
#[derive(Debug, Default)]
pub struct VerdictCache {
    verdicts: RefCell<FxHashMap<(Term, ShapeId), CachedVerdict>>,
    abandoned: Cell<usize>,
}

#[derive(Debug, Default)]
struct CachedVerdict {
    complete: Option<bool>,
    at_depth: FxHashMap<usize, bool>,
}

impl VerdictCache {
    fn get(&self, key: &(Term, ShapeId), depth: usize) -> Option<bool> {
        let verdicts = self.verdicts.borrow();
        let verdict = verdicts.get(key)?;
        if let Some(conforms) = verdict.complete {
            return Some(conforms);
        }
        let conforms = *verdict.at_depth.get(&depth)?;
        // Reusing a partial verdict makes the caller partial too
        self.abandoned.set(self.abandoned.get() + 1);
        Some(conforms)
    }

    fn insert(&self, key: (Term, ShapeId), depth: Option<usize>, conforms: bool) {
        let mut verdicts = self.verdicts.borrow_mut();
        let verdict = verdicts.entry(key).or_default();
        match depth {
            None => verdict.complete = Some(conforms),
            Some(depth) => {
                verdict.at_depth.insert(depth, conforms);
            }
        }
    }

    /// Number of `(subject, shape)` pairs with a cached verdict.
    pub fn len(&self) -> usize {
        self.verdicts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.borrow().is_empty()
    }
}

/// Evaluates one combinator on `subject`.
///
/// Returns the failure detail, or `None` if the combinator is satisfied or has been
/// abandoned.
pub fn evaluate<E: ShapeEvaluator + ?Sized>(
    evaluator: &E,
    kind: CombinatorKind,
    subject: &Term,
    shapes: &[ShapeId],
    recursion: &Recursion<'_>,
) -> Option<ResultDetail> {
    if recursion.depth() > evaluator.max_depth() {
        tracing::error!(
            %kind,
            subject = %subject,
            max_depth = evaluator.max_depth(),
            "shape references are nested too deeply, the constraint is not evaluated"
        );
        recursion.abandon();
        return None;
    }
    let mut passed = 0;
    for shape in shapes {
        if recursion.is_active(subject, shape) {
            tracing::error!(
                %kind,
                subject = %subject,
                %shape,
                "recursive shape reference, the constraint is not evaluated"
            );
            recursion.abandon();
            return None;
        }
        if reference_conforms(evaluator, kind, subject, shape, recursion) {
            passed += 1;
        }
    }
    if kind.is_satisfied(passed, shapes.len()) {
        None
    } else {
        Some(ResultDetail::Combinator {
            kind,
            shapes: shapes.to_vec(),
            passed,
        })
    }
}

/// Validates `subject` against one reference, through the cache of `recursion` if any.
fn reference_conforms<E: ShapeEvaluator + ?Sized>(
    evaluator: &E,
    kind: CombinatorKind,
    subject: &Term,
    shape: &ShapeId,
    recursion: &Recursion<'_>,
) -> bool {
    let lookup = recursion.cache.map(|cache| {
        let key = (subject.clone(), shape.clone());
        let cached = cache.get(&key, recursion.depth());
        (cache, key, cached)
    });
    if let Some((_, _, Some(conforms))) = lookup {
        return conforms;
    }
    let abandoned_before = recursion.cache.map(|cache| cache.abandoned.get());
    let inner = recursion.enter(subject, shape);
    let conforms = match evaluator.shape_results(subject, shape, &inner) {
        Some(results) => results.is_empty(),
        None => {
            tracing::warn!(%kind, %shape, "unknown shape reference, considered failing");
            false
        }
    };
    if let (Some((cache, key, _)), Some(before)) = (lookup, abandoned_before) {
        let complete = cache.abandoned.get() == before;
        cache.insert(key, (!complete).then(|| recursion.depth()), conforms);
    }
    conforms
}

/// Every combinator of `logic`, in declaration order by kind.
fn combinators(
    logic: &LogicalConstraints,
) -> impl Iterator<Item = (CombinatorKind, &[ShapeId])> {
    lists(CombinatorKind::And, &logic.and)
        .chain(lists(CombinatorKind::Or, &logic.or))
        .chain(lists(CombinatorKind::Xone, &logic.xone))
        .chain(singles(CombinatorKind::Not, &logic.not))
        .chain(singles(CombinatorKind::Node, &logic.node))
}

fn lists(
    kind: CombinatorKind,
    lists: &[Vec<ShapeId>],
) -> impl Iterator<Item = (CombinatorKind, &[ShapeId])> {
    lists.iter().map(move |shapes| (kind, shapes.as_slice()))
}

fn singles(
    kind: CombinatorKind,
    shapes: &[ShapeId],
) -> impl Iterator<Item = (CombinatorKind, &[ShapeId])> {
    shapes
        .iter()
        .map(move |shape| (kind, slice::from_ref(shape)))
}

/// Evaluates the combinators of a node shape on the focus node.
pub fn validate_node<E: ShapeEvaluator + ?Sized>(
    evaluator: &E,
    focus: &Term,
    shape: &NodeShape,
    recursion: &Recursion<'_>,
) -> Vec<ValidationResult> {
    combinators(&shape.logic)
        .filter_map(|(kind, shapes)| {
            let detail = evaluate(evaluator, kind, focus, shapes, recursion)?;
            Some(node_result(shape, focus, detail))
        })
        .collect()
}

/// Evaluates the combinators of a property shape on each value, independently.
pub fn validate_property<E: ShapeEvaluator + ?Sized>(
    evaluator: &E,
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
    recursion: &Recursion<'_>,
) -> Vec<ValidationResult> {
    if shape.logic.is_empty() {
        return Vec::new();
    }
    let mut results = Vec::new();
    for value in shape.values(graph, focus) {
        for (kind, shapes) in combinators(&shape.logic) {
            if let Some(detail) = evaluate(evaluator, kind, &value, shapes, recursion) {
                results.push(property_result(shape, focus, Some(&value), detail));
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;
    use rustc_hash::FxHashMap;
    use std::cell::Cell;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new(format!("http://example.org/{name}")).unwrap()
    }

    fn id(name: &str) -> ShapeId {
        ex(name).into()
    }

    /// Shapes passing or failing regardless of the subject.
    struct Fixed {
        verdicts: FxHashMap<ShapeId, bool>,
    }

    impl Fixed {
        fn new(verdicts: &[(&str, bool)]) -> Self {
            Self {
                verdicts: verdicts.iter().map(|(n, v)| (id(n), *v)).collect(),
            }
        }
    }

    impl ShapeEvaluator for Fixed {
        fn shape_results(
            &self,
            subject: &Term,
            shape: &ShapeId,
            _recursion: &Recursion<'_>,
        ) -> Option<Vec<ValidationResult>> {
            let passes = *self.verdicts.get(shape)?;
            Some(if passes {
                Vec::new()
            } else {
                vec![ValidationResult::new(
                    subject.clone(),
                    shape.clone(),
                    ResultDetail::Class {
                        expected: ex("C"),
                    },
                )]
            })
        }

        fn max_depth(&self) -> usize {
            50
        }
    }

    fn fails(evaluator: &Fixed, kind: CombinatorKind, shapes: &[&str]) -> bool {
        let shapes = shapes.iter().map(|n| id(n)).collect::<Vec<_>>();
        evaluate(
            evaluator,
            kind,
            &ex("x").into(),
            &shapes,
            &Recursion::default(),
        )
        .is_some()
    }

    #[test]
    fn test_truth_tables() {
        for a in [true, false] {
            for b in [true, false] {
                let evaluator = Fixed::new(&[("A", a), ("B", b)]);
                assert_eq!(fails(&evaluator, CombinatorKind::And, &["A", "B"]), !(a && b));
                assert_eq!(fails(&evaluator, CombinatorKind::Or, &["A", "B"]), !(a || b));
                assert_eq!(fails(&evaluator, CombinatorKind::Xone, &["A", "B"]), a == b);
                assert_eq!(fails(&evaluator, CombinatorKind::Not, &["A"]), a);
                assert_eq!(fails(&evaluator, CombinatorKind::Node, &["A"]), !a);
            }
        }
    }

    #[test]
    fn test_xone_counts_duplicates() {
        let passing = Fixed::new(&[("S", true)]);
        let failing = Fixed::new(&[("S", false)]);
        assert!(fails(&passing, CombinatorKind::Xone, &["S", "S"]));
        assert!(fails(&failing, CombinatorKind::Xone, &["S", "S"]));
        assert!(!fails(&passing, CombinatorKind::Xone, &["S"]));
        assert!(!fails(&passing, CombinatorKind::And, &["S", "S"]));
        assert!(!fails(&passing, CombinatorKind::Or, &["S", "S"]));
    }

    #[test]
    fn test_failure_detail_counts_passes() {
        let evaluator = Fixed::new(&[("S", true)]);
        let shapes = [id("S"), id("S")];
        assert_eq!(
            evaluate(
                &evaluator,
                CombinatorKind::Xone,
                &ex("x").into(),
                &shapes,
                &Recursion::default()
            ),
            Some(ResultDetail::Combinator {
                kind: CombinatorKind::Xone,
                shapes: shapes.to_vec(),
                passed: 2,
            })
        );
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let evaluator = Fixed::new(&[("A", true)]);
        assert!(fails(&evaluator, CombinatorKind::And, &["A", "Unknown"]));
        assert!(!fails(&evaluator, CombinatorKind::Or, &["A", "Unknown"]));
        assert!(!fails(&evaluator, CombinatorKind::Not, &["Unknown"]));
    }

    /// Every shape is `sh:not` of the next one: `S0 -> S1 -> S2 -> ...`.
    struct Chain {
        calls: Cell<usize>,
    }

    impl ShapeEvaluator for Chain {
        fn shape_results(
            &self,
            subject: &Term,
            shape: &ShapeId,
            recursion: &Recursion<'_>,
        ) -> Option<Vec<ValidationResult>> {
            self.calls.set(self.calls.get() + 1);
            let next = id(&format!("S{}", recursion.depth()));
            Some(
                evaluate(self, CombinatorKind::Not, subject, &[next], recursion)
                    .map(|detail| ValidationResult::new(subject.clone(), shape.clone(), detail))
                    .into_iter()
                    .collect(),
            )
        }

        fn max_depth(&self) -> usize {
            50
        }
    }

    #[test]
    fn test_depth_is_bounded() {
        let evaluator = Chain {
            calls: Cell::new(0),
        };
        // The deepest shape conforms since its combinator is abandoned, then verdicts alternate.
        assert!(
            evaluate(
                &evaluator,
                CombinatorKind::Not,
                &ex("x").into(),
                &[id("S0")],
                &Recursion::default(),
            )
            .is_some()
        );
        assert_eq!(evaluator.calls.get(), 51);
    }

    /// Every shape is `sh:and` of the next one, twice, down to `levels`.
    struct FanOut {
        levels: usize,
        calls: Cell<usize>,
    }

    impl ShapeEvaluator for FanOut {
        fn shape_results(
            &self,
            subject: &Term,
            shape: &ShapeId,
            recursion: &Recursion<'_>,
        ) -> Option<Vec<ValidationResult>> {
            self.calls.set(self.calls.get() + 1);
            if recursion.depth() >= self.levels {
                return Some(Vec::new());
            }
            let next = id(&format!("S{}", recursion.depth()));
            Some(
                evaluate(
                    self,
                    CombinatorKind::And,
                    subject,
                    &[next.clone(), next],
                    recursion,
                )
                .map(|detail| ValidationResult::new(subject.clone(), shape.clone(), detail))
                .into_iter()
                .collect(),
            )
        }

        fn max_depth(&self) -> usize {
            50
        }
    }

    fn fan_out_calls(levels: usize) -> usize {
        let evaluator = FanOut {
            levels,
            calls: Cell::new(0),
        };
        let cache = VerdictCache::default();
        let shapes = [id("Root"), id("Root")];
        assert!(
            evaluate(
                &evaluator,
                CombinatorKind::And,
                &ex("x").into(),
                &shapes,
                &Recursion::with_cache(&cache),
            )
            .is_none()
        );
        evaluator.calls.get()
    }

    #[test]
    fn test_cached_fan_out_is_linear() {
        assert_eq!(fan_out_calls(40), 40);
    }

    #[test]
    fn test_cached_fan_out_past_the_depth_limit() {
        // Verdicts below the limit are partial and only reused at the same depth
        assert_eq!(fan_out_calls(200), 51);
    }

    /// A single shape defined as `sh:not` itself.
    struct SelfReference;

    impl ShapeEvaluator for SelfReference {
        fn shape_results(
            &self,
            subject: &Term,
            shape: &ShapeId,
            recursion: &Recursion<'_>,
        ) -> Option<Vec<ValidationResult>> {
            Some(
                evaluate(self, CombinatorKind::Not, subject, slice::from_ref(shape), recursion)
                    .map(|detail| ValidationResult::new(subject.clone(), shape.clone(), detail))
                    .into_iter()
                    .collect(),
            )
        }

        fn max_depth(&self) -> usize {
            50
        }
    }

    #[test]
    fn test_self_reference_terminates() {
        let shapes = [id("S")];
        let recursion = Recursion::default();
        let focus = ex("x").into();
        let outer = recursion.enter(&focus, &shapes[0]);
        // The inner reference to S is abandoned, so S conforms and `sh:not S` fails.
        assert!(
            evaluate(
                &SelfReference,
                CombinatorKind::Not,
                &focus,
                &shapes,
                &Recursion::default()
            )
            .is_some()
        );
        assert!(outer.is_active(&focus, &shapes[0]));
        assert!(!outer.is_active(&ex("y").into(), &shapes[0]));
    }
}
