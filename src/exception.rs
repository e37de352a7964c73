use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::stack::StackTrace;
use crate::value::Value;

/// Type name given to aggregates built with [`Exception::aggregate`].
pub const AGGREGATE_TYPE_NAME: &str = "AggregateException";

/// How an exception links to the exceptions that caused it.
#[derive(Debug, Clone)]
pub enum Causes {
    /// At most one nested cause.
    Single(Option<Arc<Exception>>),
    /// A fan-out of independent causes, e.g. from parallel work.
    Aggregate(Vec<Arc<Exception>>),
}

/// An exception graph to be logged.
///
/// This is plain data describing a failure, not a Rust error being
/// propagated. Build it from a `std::error::Error` with
/// [`Exception::from_error`], or directly with the builder methods.
#[derive(Debug, Clone)]
pub struct Exception {
    type_name: String,
    message: String,
    stack_trace: Option<StackTrace>,
    data: Vec<(String, Value)>,
    causes: Causes,
}

impl Exception {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            data: Vec::new(),
            causes: Causes::Single(None),
        }
    }

    /// Like [`Exception::new`], with the current call stack attached.
    #[inline(never)]
    pub fn capture(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(type_name, message).with_stack_trace(StackTrace::capture())
    }

    /// An aggregate of independent causes.
    pub fn aggregate(message: impl Into<String>, inner: Vec<Exception>) -> Self {
        Self {
            causes: Causes::Aggregate(inner.into_iter().map(Arc::new).collect()),
            ..Self::new(AGGREGATE_TYPE_NAME, message)
        }
    }

    /// Convert a Rust error and its `source()` chain into a linear chain.
    pub fn from_error<E: StdError + 'static>(error: &E) -> Self {
        Self {
            causes: Causes::Single(error.source().map(|s| Arc::new(Self::from_source(s)))),
            ..Self::new(std::any::type_name::<E>(), error.to_string())
        }
    }

    fn from_source(error: &(dyn StdError + 'static)) -> Self {
        Self {
            causes: Causes::Single(error.source().map(|s| Arc::new(Self::from_source(s)))),
            ..Self::new(debug_type_name(error), error.to_string())
        }
    }

    pub fn with_inner(mut self, inner: Exception) -> Self {
        self.causes = Causes::Single(Some(Arc::new(inner)));
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    /// Attach a key/value annotation. Annotations are harvested into the
    /// event with the `ex_` collision prefix.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Last path segment of the type name, without generic arguments.
    pub fn short_type_name(&self) -> &str {
        let base = self
            .type_name
            .split_once('<')
            .map_or(self.type_name.as_str(), |(head, _)| head);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> Option<&StackTrace> {
        self.stack_trace.as_ref()
    }

    pub fn data(&self) -> &[(String, Value)] {
        &self.data
    }

    pub fn causes(&self) -> &Causes {
        &self.causes
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.causes, Causes::Aggregate(_))
    }

    /// The first nested cause (for an aggregate, its first member).
    pub fn inner(&self) -> Option<&Arc<Exception>> {
        match &self.causes {
            Causes::Single(inner) => inner.as_ref(),
            Causes::Aggregate(inner) => inner.first(),
        }
    }
}

/// Full description: type, message, nested causes and stack trace.
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Causes::Single(Some(inner)) = &self.causes {
            write!(f, " ---> {inner}")?;
            f.write_str("\n   --- End of inner exception stack trace ---")?;
        }
        if let Some(trace) = self.stack_trace.as_ref().filter(|t| !t.is_empty()) {
            write!(f, "\n{trace}")?;
        }
        if let Causes::Aggregate(inner) = &self.causes {
            for (n, exception) in inner.iter().enumerate() {
                write!(f, "\n---> (Inner Exception #{n}) {exception}<---\n")?;
            }
        }
        Ok(())
    }
}

/// Best-effort type name for a type-erased error: the leading path of its
/// `Debug` output, e.g. `ParseIntError` for `ParseIntError { kind: .. }`.
fn debug_type_name(error: &dyn StdError) -> String {
    let debug = format!("{error:?}");
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

/// Flatten an exception graph into the ordered sequence of exceptions to
/// log, depth first.
///
/// A plain exception is followed by its cause chain. An aggregate is
/// followed by its members, with nested aggregates expanded in place: a
/// nested aggregate contributes its members but not itself. `None` yields
/// an empty sequence.
pub fn flatten_exceptions(exception: Option<&Arc<Exception>>) -> Vec<Arc<Exception>> {
    let mut out = Vec::new();
    if let Some(exception) = exception {
        walk(exception, &mut out);
    }
    out
}

fn walk(exception: &Arc<Exception>, out: &mut Vec<Arc<Exception>>) {
    out.push(Arc::clone(exception));
    match &exception.causes {
        Causes::Single(Some(inner)) => walk(inner, out),
        Causes::Single(None) => {}
        Causes::Aggregate(members) => {
            let mut leaves = Vec::new();
            expand_aggregate(members, &mut leaves);
            for leaf in &leaves {
                walk(leaf, out);
            }
        }
    }
}

fn expand_aggregate(members: &[Arc<Exception>], leaves: &mut Vec<Arc<Exception>>) {
    for member in members {
        match &member.causes {
            Causes::Aggregate(nested) => expand_aggregate(nested, leaves),
            Causes::Single(_) => leaves.push(Arc::clone(member)),
        }
    }
}
