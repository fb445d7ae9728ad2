//! Metrics definitions for the lead relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const LEAD_REQUESTS: MetricDef = MetricDef {
    name: "lead.requests",
    metric_type: MetricType::Counter,
    description: "Lead submissions processed. Tagged with outcome.",
};

pub const LEAD_MALFORMED_INPUT: MetricDef = MetricDef {
    name: "lead.malformed_input",
    metric_type: MetricType::Counter,
    description: "Lead submissions whose body was not a JSON object",
};

pub const DISPATCH_DURATION: MetricDef = MetricDef {
    name: "dispatch.duration",
    metric_type: MetricType::Histogram,
    description: "Conversion API call duration in seconds. Tagged with outcome.",
};

pub const ARCHIVE_REQUESTS: MetricDef = MetricDef {
    name: "archive.requests",
    metric_type: MetricType::Counter,
    description: "Spreadsheet archival requests. Tagged with outcome.",
};

pub const REQUESTS_REJECTED: MetricDef = MetricDef {
    name: "requests.rejected",
    metric_type: MetricType::Counter,
    description: "Requests rejected before reaching a handler. Tagged with reason.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    LEAD_REQUESTS,
    LEAD_MALFORMED_INPUT,
    DISPATCH_DURATION,
    ARCHIVE_REQUESTS,
    REQUESTS_REJECTED,
];
