//! Platform built-in module names.

use rustc_hash::FxHashSet;
use std::sync::LazyLock;

/// Content served in place of a built-in module.
pub const BUILTIN_STUB: &str = "module.exports = {};\n";

static BUILTINS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    [
        "assert",
        "async_hooks",
        "buffer",
        "child_process",
        "cluster",
        "console",
        "constants",
        "crypto",
        "dgram",
        "diagnostics_channel",
        "dns",
        "domain",
        "events",
        "fs",
        "http",
        "http2",
        "https",
        "inspector",
        "module",
        "net",
        "os",
        "path",
        "perf_hooks",
        "process",
        "punycode",
        "querystring",
        "readline",
        "repl",
        "stream",
        "string_decoder",
        "sys",
        "timers",
        "tls",
        "trace_events",
        "tty",
        "url",
        "util",
        "v8",
        "vm",
        "wasi",
        "worker_threads",
        "zlib",
    ]
    .into_iter()
    .collect()
});

/// `fs`, `fs/promises`, `node:fs` and friends.
pub fn is_builtin(specifier: &str) -> bool {
    if let Some(rest) = specifier.strip_prefix("node:") {
        return !rest.is_empty();
    }
    let head = specifier.split('/').next().unwrap_or(specifier);
    BUILTINS.contains(head)
}
