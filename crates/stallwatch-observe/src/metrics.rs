//! Blocking-call metrics.
//!
//! [`BlockingMetrics`] counts blocking calls and total blocked time per
//! (call site, thread name) pair, and counts context-local storage
//! initializations. The call site is whatever a [`CallFinder`] names for the
//! operation; the default looks for the caller in a captured backtrace.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use stallwatch_core::{BlockingEvent, ConsumerResult, OperationId};
use stallwatch_registry::{ConsumerRegistry, ExitConsumer, StorageInitConsumer};

/// Call tag used when no caller could be determined.
pub const UNKNOWN_CALL: &str = "unknown";

/// Frames under these paths belong to the detector itself.
///
/// The facade is matched by its types rather than its crate name, since a
/// binary may also be called `stallwatch`.
const INSTRUMENTATION_PREFIXES: &[&str] = &[
    "stallwatch::Stallwatch::",
    "stallwatch::StallwatchBuilder::",
    "stallwatch::StallwatchRuntime::",
    "stallwatch_core::",
    "stallwatch_runtime::",
    "stallwatch_observe::",
    "stallwatch_registry::",
];

const STD_PREFIXES: &[&str] = &["std::", "core::", "alloc::", "__rust", "rust_begin_unwind"];

/// Replace every run of ASCII digits with `N`.
///
/// Keeps thread pools from producing one metric per worker:
/// `"worker-12-3"` becomes `"worker-N-N"`.
pub fn sanitize_thread_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_digits = false;
    for c in name.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                out.push('N');
                in_digits = true;
            }
        } else {
            out.push(c);
            in_digits = false;
        }
    }
    out
}

/// A symbolized stack frame, most recent first in a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    symbol: String,
}

impl Frame {
    /// Create a frame from a demangled symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: normalize_symbol(&symbol.into()),
        }
    }

    /// The symbol without generic arguments, hash or closure suffixes.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The frame as `path.member`.
    pub fn call_name(&self) -> String {
        match self.symbol.rsplit_once("::") {
            Some((path, member)) => format!("{}.{}", path, member),
            None => self.symbol.clone(),
        }
    }

    /// Standard library, runtime glue, or a symbol without a Rust path.
    fn is_foreign(&self) -> bool {
        !self.symbol.contains("::") || STD_PREFIXES.iter().any(|p| self.symbol.starts_with(p))
    }

    fn is_instrumentation(&self, operation: &OperationId) -> bool {
        if INSTRUMENTATION_PREFIXES
            .iter()
            .any(|p| self.symbol.starts_with(p))
        {
            return true;
        }
        let owner = operation.owner();
        let owner_tail = owner.rsplit("::").next().unwrap_or(owner);
        self.symbol
            .strip_suffix(operation.member())
            .and_then(|rest| rest.strip_suffix("::"))
            .is_some_and(|path| {
                path == owner || path == owner_tail || path.ends_with(&format!("::{}", owner_tail))
            })
    }
}

fn normalize_symbol(raw: &str) -> String {
    let mut symbol = raw.trim();

    // legacy mangling hash, "::h0123456789abcdef"
    if let Some((head, hash)) = symbol.rsplit_once("::h") {
        if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
            symbol = head;
        }
    }

    // "<Type>::member" and "<Type as Trait>::member" are reported as "Type::member"
    let owned;
    if symbol.starts_with('<') {
        let Some(close) = matching_angle(symbol) else {
            return String::new();
        };
        let rest = &symbol[close + 1..];
        if rest.is_empty() {
            // placeholders such as "<unknown>"
            return String::new();
        }
        let receiver = receiver_type(&symbol[1..close])
            .trim_start_matches('&')
            .trim_start_matches("mut ")
            .trim_start_matches("dyn ");
        owned = format!("{}{}", receiver, rest);
        symbol = &owned;
    }

    let mut out = strip_generics(symbol);

    const CLOSURE: &str = "::{{closure}}";
    while out.ends_with(CLOSURE) {
        out.truncate(out.len() - CLOSURE.len());
    }
    out
}

/// Byte index of the `>` closing the `<` that starts `symbol`.
fn matching_angle(symbol: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut prev = ' ';
    for (index, c) in symbol.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
        prev = c;
    }
    None
}

/// The `Type` of a `Type as Trait` receiver.
fn receiver_type(receiver: &str) -> &str {
    let mut depth = 0usize;
    let mut prev = ' ';
    for (index, c) in receiver.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 && receiver[index..].starts_with(" as ") => {
                return &receiver[..index];
            }
            _ => {}
        }
        prev = c;
    }
    receiver
}

/// Drop generic arguments after a path segment, and whole bracketed
/// segments: `module::<impl Type>::member` becomes `module::member`.
fn strip_generics(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    let mut depth = 0usize;
    let mut prev = ' ';
    for c in symbol.chars() {
        match c {
            '<' => {
                if depth == 0 && out.ends_with("::") {
                    out.truncate(out.len() - 2);
                }
                depth += 1;
            }
            '>' if prev != '-' && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
        prev = c;
    }
    out
}

/// Parse the frames of a rendered backtrace.
pub fn parse_backtrace(rendered: &str) -> Vec<Frame> {
    rendered
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim().split_once(": ")?;
            index
                .chars()
                .all(|c| c.is_ascii_digit())
                .then(|| Frame::new(symbol))
        })
        .collect()
}

/// Pick the frame that caused a blocking call.
///
/// Frames are most recent first. The search starts after the last frame
/// belonging to the detector or to the blocking operation itself. Among the
/// frames after it, the first whose symbol starts with `preferred_prefix` wins;
/// otherwise the first frame outside the standard library.
pub fn find_call(
    frames: &[Frame],
    operation: &OperationId,
    preferred_prefix: Option<&str>,
) -> Option<String> {
    let start = frames
        .iter()
        .rposition(|f| f.is_instrumentation(operation))?
        + 1;

    let mut first_non_std = None;
    for frame in &frames[start..] {
        if frame.is_instrumentation(operation) {
            continue;
        }
        if preferred_prefix.is_some_and(|p| frame.symbol().starts_with(p)) {
            return Some(frame.call_name());
        }
        if first_non_std.is_none() && !frame.is_foreign() {
            first_non_std = Some(frame);
        }
    }

    first_non_std.map(Frame::call_name)
}

/// Names the call site responsible for a blocking operation.
///
/// Runs on the blocked context, inside the exit dispatch.
pub trait CallFinder: Send + Sync {
    /// The call site of `operation`, or `None` if nothing useful was found.
    fn find_call(&self, operation: &OperationId) -> Option<String>;
}

impl<F> CallFinder for F
where
    F: Fn(&OperationId) -> Option<String> + Send + Sync,
{
    fn find_call(&self, operation: &OperationId) -> Option<String> {
        self(operation)
    }
}

/// Finds the caller in a backtrace captured at exit time.
#[derive(Debug, Clone, Default)]
pub struct BacktraceCallFinder {
    preferred_prefix: Option<String>,
}

impl BacktraceCallFinder {
    /// Create a finder without a preferred prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer frames whose symbol starts with `prefix`, e.g. `"my_app::"`.
    pub fn with_preferred_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.preferred_prefix = Some(prefix.into());
        self
    }
}

impl CallFinder for BacktraceCallFinder {
    fn find_call(&self, operation: &OperationId) -> Option<String> {
        let rendered = Backtrace::force_capture().to_string();
        let frames = parse_backtrace(&rendered);
        find_call(&frames, operation, self.preferred_prefix.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    call: String,
    thread_name: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct CallStats {
    count: u64,
    blocked_time_nanos: u64,
}

/// Metrics for one (call, thread name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetrics {
    /// Call site tag.
    pub call: String,
    /// Sanitized thread name.
    pub thread_name: String,
    /// Number of blocking calls.
    pub count: u64,
    /// Total time blocked.
    pub blocked_time_nanos: u64,
}

/// Snapshot of collected metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Per-call metrics, sorted by call then thread name.
    pub calls: Vec<CallMetrics>,
    /// Number of context-local storage initializations.
    pub storage_inits: u64,
}

impl MetricsSnapshot {
    /// Total blocking calls over all call sites.
    pub fn total_calls(&self) -> u64 {
        self.calls.iter().map(|c| c.count).sum()
    }

    /// Total blocked time over all call sites.
    pub fn total_blocked_time_nanos(&self) -> u64 {
        self.calls.iter().map(|c| c.blocked_time_nanos).sum()
    }

    /// Metrics for `call`, summed over threads.
    pub fn for_call(&self, call: &str) -> Option<CallMetrics> {
        let mut matching = self.calls.iter().filter(|c| c.call == call).peekable();
        let first = matching.peek()?;
        let mut sum = CallMetrics {
            call: first.call.clone(),
            thread_name: String::from("*"),
            count: 0,
            blocked_time_nanos: 0,
        };
        for c in matching {
            sum.count += c.count;
            sum.blocked_time_nanos += c.blocked_time_nanos;
        }
        Some(sum)
    }
}

/// Records blocking-call metrics.
///
/// Register it with [`install`](Self::install), which adds it as the first
/// exit consumer and as a storage-initialization consumer.
pub struct BlockingMetrics {
    calls: RwLock<HashMap<CallKey, CallStats>>,
    storage_inits: AtomicU64,
    finder: Box<dyn CallFinder>,
}

impl BlockingMetrics {
    /// Create metrics using the backtrace call finder.
    pub fn new() -> Self {
        Self::with_finder(BacktraceCallFinder::new())
    }

    /// Create metrics using a custom call finder.
    pub fn with_finder(finder: impl CallFinder + 'static) -> Self {
        Self::with_boxed_finder(Box::new(finder))
    }

    /// Create metrics using an already boxed call finder.
    pub fn with_boxed_finder(finder: Box<dyn CallFinder>) -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            storage_inits: AtomicU64::new(0),
            finder,
        }
    }

    /// Register as exit and storage-initialization consumer.
    pub fn install(self: &Arc<Self>, consumers: &ConsumerRegistry) {
        consumers.add_on_exit_consumer_first(Arc::clone(self) as Arc<dyn ExitConsumer>);
        consumers.add_storage_init_consumer(Arc::clone(self) as Arc<dyn StorageInitConsumer>);
    }

    /// Record one blocking call on the current thread.
    pub fn record(&self, operation: &OperationId, blocked_time_nanos: u64) {
        let call = self
            .finder
            .find_call(operation)
            .unwrap_or_else(|| UNKNOWN_CALL.to_string());
        let thread_name = sanitize_thread_name(thread::current().name().unwrap_or("unnamed"));

        let mut calls = self.calls.write();
        let stats = calls.entry(CallKey { call, thread_name }).or_default();
        stats.count += 1;
        stats.blocked_time_nanos = stats.blocked_time_nanos.saturating_add(blocked_time_nanos);
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut calls: Vec<CallMetrics> = self
            .calls
            .read()
            .iter()
            .map(|(key, stats)| CallMetrics {
                call: key.call.clone(),
                thread_name: key.thread_name.clone(),
                count: stats.count,
                blocked_time_nanos: stats.blocked_time_nanos,
            })
            .collect();
        calls.sort_by(|a, b| (&a.call, &a.thread_name).cmp(&(&b.call, &b.thread_name)));

        MetricsSnapshot {
            calls,
            storage_inits: self.storage_inits.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.calls.write().clear();
        self.storage_inits.store(0, Ordering::Relaxed);
    }
}

impl Default for BlockingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitConsumer for BlockingMetrics {
    fn on_blocking_exit(&self, event: &BlockingEvent) -> ConsumerResult {
        self.record(event.operation(), event.blocked_time_nanos());
        Ok(())
    }
}

impl StorageInitConsumer for BlockingMetrics {
    fn on_storage_init(&self) -> ConsumerResult {
        self.storage_inits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for BlockingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingMetrics")
            .field("call_sites", &self.calls.read().len())
            .field("storage_inits", &self.storage_inits.load(Ordering::Relaxed))
            .finish()
    }
}
