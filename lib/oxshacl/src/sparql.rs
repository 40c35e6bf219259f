//! SPARQL based constraints.
//!
//! The query of a [`SparqlConstraint`] is run by a [`QueryEngine`] with the `$this` variable
//! pre-bound to the focus node. A non empty solution sequence gives exactly one result
//! carrying the rows. A query that fails to run gives one [`ResultDetail::QueryFailure`]
//! result for this constraint and the validation goes on.
//!
//! With the `sparql` feature, [`SparqlEngine`] runs the queries with `spareval`.

use oxrdf::{Term, Variable};
use std::time::Duration;

use crate::model::{NodeShape, SparqlConstraint};
use crate::report::{ResultDetail, ValidationResult};

/// Runs SPARQL constraint queries against the data graph.
///
/// Implementations must be usable from several threads at once: focus nodes are
/// validated in parallel.
pub trait QueryEngine: Send + Sync {
    /// Runs the SELECT `query` with the variable `focus_variable` bound to `focus`.
    ///
    /// The evaluation must give up with [`QueryError::Timeout`] once `timeout` is over.
    fn execute(
        &self,
        query: &str,
        focus_variable: &str,
        focus: &Term,
        timeout: Duration,
    ) -> Result<Vec<QueryRow>, QueryError>;
}

/// A solution of a constraint query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRow {
    bindings: Vec<(Variable, Term)>,
}

impl QueryRow {
    pub fn new(bindings: impl IntoIterator<Item = (Variable, Term)>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }

    /// The value bound to the variable named `variable`, if any.
    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings
            .iter()
            .find_map(|(v, t)| (v.as_str() == variable).then_some(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.bindings.iter().map(|(v, t)| (v, t))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Failure to run a constraint query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The query text is not valid SPARQL.
    #[error("Invalid SPARQL query: {0}")]
    Syntax(String),
    /// The query uses something the engine does not support.
    #[error("Unsupported SPARQL query: {0}")]
    Unsupported(String),
    /// The evaluation did not finish in time.
    #[error("The SPARQL query did not finish in {0:?}")]
    Timeout(Duration),
    /// The evaluation failed.
    #[error("SPARQL evaluation error: {0}")]
    Evaluation(String),
    /// No query engine is available.
    #[error("No SPARQL query engine is available")]
    NoEngine,
}

/// Runs one constraint for one focus node.
///
/// Returns `None` if the focus node satisfies the constraint.
pub fn evaluate(
    engine: Option<&dyn QueryEngine>,
    constraint: &SparqlConstraint,
    focus: &Term,
    timeout: Duration,
) -> Option<ResultDetail> {
    let outcome = match engine {
        Some(engine) => engine.execute(
            constraint.query(),
            SparqlConstraint::FOCUS_VARIABLE,
            focus,
            timeout,
        ),
        None => Err(QueryError::NoEngine),
    };
    match outcome {
        Ok(rows) if rows.is_empty() => None,
        Ok(rows) => Some(ResultDetail::Sparql { rows }),
        Err(error) => {
            tracing::error!(
                shape = %constraint.shape(),
                focus = %focus,
                %error,
                "SPARQL constraint evaluation failed"
            );
            Some(ResultDetail::QueryFailure { error })
        }
    }
}

/// Runs the SPARQL constraints of a node shape on `focus`.
pub fn validate_node(
    engine: Option<&dyn QueryEngine>,
    focus: &Term,
    shape: &NodeShape,
    timeout: Duration,
) -> Vec<ValidationResult> {
    shape
        .sparql
        .iter()
        .filter_map(|constraint| {
            let detail = evaluate(engine, constraint, focus, timeout)?;
            let first_row = match &detail {
                ResultDetail::Sparql { rows } => rows.first(),
                _ => None,
            };
            let value = first_row
                .and_then(|row| row.get("value"))
                .unwrap_or(focus)
                .clone();
            let message = match constraint.message().or(shape.message.as_deref()) {
                Some(template) => fill_message(template, first_row),
                None => detail.to_string(),
            };
            Some(
                ValidationResult::new(focus.clone(), constraint.shape().clone(), detail)
                    .with_value(value)
                    .with_severity(shape.severity)
                    .with_message(message),
            )
        })
        .collect()
}

/// Replaces the `{?var}` and `{$var}` placeholders of a message by the row bindings.
fn fill_message(template: &str, row: Option<&QueryRow>) -> String {
    let Some(row) = row else {
        return template.to_owned();
    };
    let mut message = template.to_owned();
    for (variable, value) in row.iter() {
        let value = match value {
            Term::Literal(l) => l.value().to_owned(),
            _ => value.to_string(),
        };
        for sigil in ['?', '$'] {
            message = message.replace(&format!("{{{sigil}{}}}", variable.as_str()), &value);
        }
    }
    message
}

#[cfg(feature = "sparql")]
pub use self::engine::SparqlEngine;

#[cfg(feature = "sparql")]
mod engine {
    use oxrdf::{Dataset, Graph, GraphNameRef, Term, Variable};
    use spareval::{CancellationToken, QueryEvaluationError, QueryEvaluator, QueryResults};
    use spargebra::algebra::GraphPattern;
    use spargebra::{Query, SparqlParser};
    use std::sync::Arc;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{QueryEngine, QueryError, QueryRow};

    /// [`QueryEngine`] evaluating queries with `spareval` over a snapshot of the data graph.
    ///
    /// Each query runs on its own thread. Once the timeout is over the caller gets
    /// [`QueryError::Timeout`] right away and the evaluation is cancelled.
    #[derive(Debug, Clone, Default)]
    pub struct SparqlEngine {
        dataset: Arc<Dataset>,
    }

    impl SparqlEngine {
        /// Copies `graph` into the default graph of the queried dataset.
        pub fn new(graph: &Graph) -> Self {
            Self {
                dataset: Arc::new(
                    graph
                        .iter()
                        .map(|t| t.in_graph(GraphNameRef::DefaultGraph))
                        .collect(),
                ),
            }
        }
    }

    impl From<Dataset> for SparqlEngine {
        fn from(dataset: Dataset) -> Self {
            Self {
                dataset: Arc::new(dataset),
            }
        }
    }

    impl QueryEngine for SparqlEngine {
        fn execute(
            &self,
            query: &str,
            focus_variable: &str,
            focus: &Term,
            timeout: Duration,
        ) -> Result<Vec<QueryRow>, QueryError> {
            let variable =
                Variable::new(focus_variable).map_err(|e| QueryError::Syntax(e.to_string()))?;
            let mut query = SparqlParser::new()
                .parse_query(query)
                .map_err(|e| QueryError::Syntax(e.to_string()))?;
            match &mut query {
                Query::Select { pattern, .. } => project(pattern, &variable),
                Query::Ask { .. } | Query::Construct { .. } | Query::Describe { .. } => {
                    return Err(QueryError::Unsupported(
                        "only SELECT queries can be used as constraints".into(),
                    ));
                }
            }

            let cancellation_token = CancellationToken::new();
            let evaluation = Evaluation {
                dataset: Arc::clone(&self.dataset),
                query,
                variable,
                focus: focus.clone(),
                deadline: Instant::now() + timeout,
                timeout,
                cancellation_token: cancellation_token.clone(),
            };
            let (sender, receiver) = mpsc::sync_channel(1);
            thread::Builder::new()
                .name("oxshacl-sparql".into())
                .spawn(move || {
                    if sender.send(evaluation.run()).is_err() {
                        tracing::debug!("SPARQL constraint evaluation finished after its timeout");
                    }
                })
                .map_err(|e| QueryError::Evaluation(e.to_string()))?;
            match receiver.recv_timeout(timeout) {
                Ok(rows) => rows,
                Err(RecvTimeoutError::Timeout) => {
                    cancellation_token.cancel();
                    Err(QueryError::Timeout(timeout))
                }
                Err(RecvTimeoutError::Disconnected) => Err(QueryError::Evaluation(
                    "the SPARQL evaluation thread panicked".into(),
                )),
            }
        }
    }

    /// One query evaluation, owning everything it needs to run on another thread.
    struct Evaluation {
        dataset: Arc<Dataset>,
        query: Query,
        variable: Variable,
        focus: Term,
        deadline: Instant,
        timeout: Duration,
        cancellation_token: CancellationToken,
    }

    impl Evaluation {
        fn run(self) -> Result<Vec<QueryRow>, QueryError> {
            let timeout = self.timeout;
            let map_error = |error: QueryEvaluationError| match error {
                QueryEvaluationError::Cancelled => QueryError::Timeout(timeout),
                error => evaluation_error(error),
            };
            let evaluator = QueryEvaluator::new().with_cancellation_token(self.cancellation_token);
            let results = evaluator
                .prepare(&self.query)
                .substitute_variable(self.variable, self.focus)
                .execute(self.dataset.as_ref())
                .map_err(map_error)?;
            let QueryResults::Solutions(solutions) = results else {
                return Err(QueryError::Unsupported(
                    "the query did not return solutions".into(),
                ));
            };
            let mut rows = Vec::new();
            for solution in solutions {
                if Instant::now() > self.deadline {
                    return Err(QueryError::Timeout(timeout));
                }
                let solution = solution.map_err(map_error)?;
                rows.push(QueryRow::new(
                    solution.iter().map(|(v, t)| (v.clone(), t.clone())),
                ));
            }
            Ok(rows)
        }
    }

    /// Adds `variable` to the projection so that it can be substituted.
    fn project(pattern: &mut GraphPattern, variable: &Variable) {
        match pattern {
            GraphPattern::Project { variables, .. } => {
                if !variables.contains(variable) {
                    variables.push(variable.clone());
                }
            }
            GraphPattern::Distinct { inner }
            | GraphPattern::Reduced { inner }
            | GraphPattern::Slice { inner, .. }
            | GraphPattern::OrderBy { inner, .. } => project(inner, variable),
            _ => (),
        }
    }

    fn evaluation_error(error: QueryEvaluationError) -> QueryError {
        match error {
            QueryEvaluationError::UnsupportedService(_) | QueryEvaluationError::Service(_) => {
                QueryError::Unsupported(error.to_string())
            }
            _ => QueryError::Evaluation(error.to_string()),
        }
    }
}
