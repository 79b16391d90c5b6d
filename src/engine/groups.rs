//! Fixed stat-key enumerations
//!
//! The key lists are configuration, not discovery: downstream consumers
//! depend on fixed-cardinality series, so every enumerated key dispatches a
//! value (missing keys as 0) instead of disappearing when the broker omits
//! it.

/// Message-rate stats found under `message_stats`
pub const MESSAGE_STATS: [&str; 12] = [
    "ack",
    "publish",
    "publish_in",
    "publish_out",
    "confirm",
    "deliver",
    "deliver_noack",
    "get",
    "get_noack",
    "deliver_get",
    "redeliver",
    "return",
];

/// Detail keys of a `<stat>_details` sub-object
pub const MESSAGE_DETAILS: [&str; 4] = ["avg", "avg_rate", "rate", "sample"];

/// Queue-level gauges
pub const QUEUE_STATS: [&str; 4] = [
    "consumers",
    "messages",
    "messages_ready",
    "messages_unacknowledged",
];

/// Node-level OS/resource gauges
pub const NODE_STATS: [&str; 12] = [
    "disk_free",
    "disk_free_limit",
    "fd_total",
    "fd_used",
    "mem_limit",
    "mem_used",
    "proc_total",
    "proc_used",
    "processors",
    "run_queue",
    "sockets_total",
    "sockets_used",
];

/// Overview subtrees and their stat keys
pub const OVERVIEW_STATS: [(&str, &[&str]); 3] = [
    (
        "object_totals",
        &["channels", "connections", "consumers", "exchanges", "queues"],
    ),
    (
        "message_stats",
        &[
            "ack",
            "confirm",
            "deliver",
            "deliver_get",
            "deliver_noack",
            "get",
            "get_noack",
            "publish",
            "redeliver",
        ],
    ),
    (
        "queue_totals",
        &["messages", "messages_ready", "messages_unacknowledged"],
    ),
];
