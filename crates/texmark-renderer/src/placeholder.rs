//! Placeholder bookkeeping for spans resolved after the compile pass.
//!
//! Adapters that cannot produce a span's HTML synchronously register a job in
//! a [`PlaceholderRegistry`] and hand the compiler the job's placeholder token.
//! The compiler records where each token lands in its output as a
//! [`PlaceholderSpan`]. Once every job has resolved, [`Replacements::apply`]
//! splices the results into the output by byte offset.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use futures::future::{BoxFuture, join_all};

/// Kind of deferred span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    /// A highlighted code block.
    Highlight,
    /// A typeset math expression.
    Math,
}

impl JobKind {
    /// Element id prefix used in placeholder tokens.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Highlight => "hl",
            Self::Math => "math",
        }
    }
}

/// Identity of one deferred span within a single render call.
///
/// Indices are assigned per kind, sequentially from 0, so the first failing
/// math expression is always `math-0` whatever highlighting did before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderId {
    kind: JobKind,
    index: usize,
}

impl PlaceholderId {
    #[must_use]
    pub fn new(kind: JobKind, index: usize) -> Self {
        Self { kind, index }
    }

    #[must_use]
    pub fn kind(self) -> JobKind {
        self.kind
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }

    /// Inert markup emitted in place of the span until it resolves.
    ///
    /// ```
    /// use texmark_renderer::{JobKind, PlaceholderId};
    ///
    /// let id = PlaceholderId::new(JobKind::Math, 1);
    /// assert_eq!(id.token(), r#"<span id="math-1"></span>"#);
    /// ```
    #[must_use]
    pub fn token(self) -> String {
        format!(r#"<span id="{self}"></span>"#)
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.index)
    }
}

/// Byte range of a placeholder token in compiled output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderSpan {
    pub id: PlaceholderId,
    pub range: Range<usize>,
}

/// Future producing the final HTML of one deferred span.
///
/// Jobs are infallible: adapters fold engine failures into fallback markup
/// before the future completes.
pub type JobFuture = BoxFuture<'static, String>;

/// A registered job awaiting resolution.
pub struct PendingJob {
    id: PlaceholderId,
    future: JobFuture,
}

impl PendingJob {
    #[must_use]
    pub fn id(&self) -> PlaceholderId {
        self.id
    }
}

impl fmt::Debug for PendingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingJob").field("id", &self.id).finish()
    }
}

/// Per-call registry assigning ids to deferred jobs of one kind.
#[derive(Debug)]
pub struct PlaceholderRegistry {
    kind: JobKind,
    jobs: Vec<PendingJob>,
}

impl PlaceholderRegistry {
    #[must_use]
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            jobs: Vec::new(),
        }
    }

    /// Register a job and return the id its token must carry.
    pub fn register(&mut self, future: JobFuture) -> PlaceholderId {
        let id = PlaceholderId::new(self.kind, self.jobs.len());
        tracing::debug!(%id, "registered deferred job");
        self.jobs.push(PendingJob { id, future });
        id
    }

    /// Take the registered jobs, leaving the registry empty.
    #[must_use]
    pub fn into_jobs(self) -> Vec<PendingJob> {
        self.jobs
    }
}

/// Resolve all jobs concurrently.
///
/// Jobs may complete in any order; each result lands in its own id slot.
pub async fn resolve_all(jobs: Vec<PendingJob>) -> Replacements {
    let resolved = join_all(
        jobs.into_iter()
            .map(|job| async move { (job.id, job.future.await) }),
    )
    .await;

    let mut replacements = Replacements::default();
    for (id, html) in resolved {
        replacements.add(id, html);
    }
    replacements
}

/// Resolved HTML for each placeholder id.
#[derive(Debug, Default)]
pub struct Replacements {
    map: BTreeMap<PlaceholderId, String>,
}

impl Replacements {
    /// Add a resolved result.
    pub fn add(&mut self, id: PlaceholderId, html: String) {
        self.map.insert(id, html);
    }

    /// Whether every span has a resolved result.
    #[must_use]
    pub fn covers(&self, spans: &[PlaceholderSpan]) -> bool {
        spans.iter().all(|span| self.map.contains_key(&span.id))
    }

    /// Splice results into `html` in a single pass.
    ///
    /// Spans without a result keep their original token. Spans must not
    /// overlap; they are applied in ascending offset order.
    #[must_use]
    pub fn apply(&self, html: &str, spans: &[PlaceholderSpan]) -> String {
        if spans.is_empty() {
            return html.to_owned();
        }

        let mut ordered: Vec<&PlaceholderSpan> = spans.iter().collect();
        ordered.sort_by_key(|span| span.range.start);

        let extra: usize = self.map.values().map(String::len).sum();
        let mut result = String::with_capacity(html.len() + extra);
        let mut cursor = 0;
        for span in ordered {
            result.push_str(&html[cursor..span.range.start]);
            match self.map.get(&span.id) {
                Some(replacement) => result.push_str(replacement),
                None => result.push_str(&html[span.range.clone()]),
            }
            cursor = span.range.end;
        }
        result.push_str(&html[cursor..]);
        result
    }
}
