use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of query pipeline profiling metrics.
///
/// Profiling is enabled via the `MEDIALIB_PROFILE` environment variable and
/// tracks time spent in each phase of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfileSnapshot {
    /// Total nanoseconds spent compiling fetch specs.
    pub compile_ns: u64,
    /// Number of fetch specs compiled.
    pub compile_count: u64,
    /// Total nanoseconds spent evaluating collections in the store.
    pub execute_ns: u64,
    /// Number of store evaluations.
    pub execute_count: u64,
    /// Total nanoseconds spent materializing result trees.
    pub materialize_ns: u64,
    /// Number of materializations.
    pub materialize_count: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    compile_ns: AtomicU64,
    compile_count: AtomicU64,
    execute_ns: AtomicU64,
    execute_count: AtomicU64,
    materialize_ns: AtomicU64,
    materialize_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("MEDIALIB_PROFILE").is_some())
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum QueryProfileKind {
    Compile,
    Execute,
    Materialize,
}

pub(crate) fn record_profile_timer(kind: QueryProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        QueryProfileKind::Compile => (&counters.compile_ns, &counters.compile_count),
        QueryProfileKind::Execute => (&counters.execute_ns, &counters.execute_count),
        QueryProfileKind::Materialize => (&counters.materialize_ns, &counters.materialize_count),
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of current query profiling metrics.
///
/// Returns `None` unless `MEDIALIB_PROFILE` was set when profiling was
/// first consulted. When `reset` is true the counters are zeroed after
/// being read.
pub fn query_profile_snapshot(reset: bool) -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(QueryProfileSnapshot {
        compile_ns: load(&counters.compile_ns),
        compile_count: load(&counters.compile_count),
        execute_ns: load(&counters.execute_ns),
        execute_count: load(&counters.execute_count),
        materialize_ns: load(&counters.materialize_ns),
        materialize_count: load(&counters.materialize_count),
    })
}
