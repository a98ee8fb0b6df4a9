//! Static failure categories: patterns, candidate causes, remediations.
//!
//! Declaration order is the tie-break order when two categories score the same.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryDefinition {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    pub root_causes: &'static [&'static str],
    pub recommendations: &'static [&'static str],
}

pub static CATEGORIES: &[CategoryDefinition] = &[
    CategoryDefinition {
        name: "database",
        patterns: &[
            r"database.*\w+",
            r"connection.*timeout",
            r"database.*not.*available",
            r"sql.*error",
            r"deadlock",
            r"connection.*refused",
            r"too many connections",
            r"db.*connection.*failed",
            r"mysql.*error",
            r"postgresql.*error",
            r"oracle.*error",
            r"sqlite.*error",
            r"table.*not.*found",
            r"duplicate.*key",
            r"constraint.*violation",
        ],
        root_causes: &[
            "Database connection timeout",
            "Database server unavailable",
            "SQL query error",
            "Database deadlock",
            "Connection pool exhausted",
            "Database schema issue",
            "Data integrity violation",
        ],
        recommendations: &[
            "Check database connectivity and network",
            "Increase connection timeout settings",
            "Review and optimize SQL queries",
            "Monitor database performance metrics",
            "Scale database connection pool",
            "Verify database schema and migrations",
            "Review data validation logic",
        ],
    },
    CategoryDefinition {
        name: "network",
        patterns: &[
            r"network.*\w+",
            r"connection.*reset",
            r"host.*unreachable",
            r"timeout.*exceeded",
            r"dns.*resolution.*failed",
            r"socket.*timeout",
            r"connection.*aborted",
            r"network.*unreachable",
            r"port.*unreachable",
            r"ssl.*handshake.*failed",
            r"certificate.*error",
            r"tls.*error",
        ],
        root_causes: &[
            "Network connectivity issue",
            "Connection reset by peer",
            "Host unreachable",
            "Network timeout",
            "DNS resolution failure",
            "SSL/TLS certificate issue",
            "Firewall blocking connection",
        ],
        recommendations: &[
            "Check network connectivity",
            "Verify firewall and security group settings",
            "Test DNS resolution",
            "Monitor network latency",
            "Implement retry mechanisms with backoff",
            "Verify SSL/TLS certificates",
            "Check proxy and load balancer configuration",
        ],
    },
    CategoryDefinition {
        name: "memory",
        patterns: &[
            r"out.*of.*memory",
            r"memory.*leak",
            r"heap.*space",
            r"stack.*overflow",
            r"gc.*overhead",
        ],
        root_causes: &[
            "Memory exhaustion",
            "Memory leak detected",
            "Heap space insufficient",
            "Stack overflow",
            "Garbage collection overhead",
        ],
        recommendations: &[
            "Increase memory allocation",
            "Profile application for memory leaks",
            "Optimize data structures and algorithms",
            "Review recursive function calls",
            "Tune garbage collection parameters",
        ],
    },
    CategoryDefinition {
        name: "authentication",
        patterns: &[
            r"authentication.*failed",
            r"unauthorized",
            r"access.*denied",
            r"invalid.*credentials",
            r"token.*expired",
        ],
        root_causes: &[
            "Authentication failure",
            "Unauthorized access attempt",
            "Invalid credentials provided",
            "Expired authentication token",
            "Insufficient permissions",
        ],
        recommendations: &[
            "Verify user credentials",
            "Check authentication service status",
            "Review access control policies",
            "Implement token refresh mechanism",
            "Monitor for suspicious access patterns",
        ],
    },
    CategoryDefinition {
        name: "performance",
        patterns: &[
            r"slow.*query",
            r"response.*time.*exceeded",
            r"performance.*degraded",
            r"high.*cpu",
            r"thread.*pool.*exhausted",
            r"request.*timeout",
            r"processing.*slow",
            r"latency.*high",
            r"throughput.*low",
            r"queue.*full",
            r"backlog.*growing",
        ],
        root_causes: &[
            "Slow database query",
            "Response time exceeded threshold",
            "Performance degradation",
            "High CPU utilization",
            "Thread pool exhaustion",
            "Resource contention",
            "System overload",
        ],
        recommendations: &[
            "Optimize database queries and indexes",
            "Scale application resources",
            "Implement caching strategies",
            "Monitor system resource usage",
            "Tune thread pool configuration",
            "Review algorithm efficiency",
            "Implement load balancing",
        ],
    },
    CategoryDefinition {
        name: "application",
        patterns: &[
            r"null.*pointer.*exception",
            r"array.*index.*out.*of.*bounds",
            r"class.*not.*found",
            r"method.*not.*found",
            r"illegal.*argument",
            r"runtime.*exception",
            r"assertion.*failed",
            r"validation.*failed",
        ],
        root_causes: &[
            "Null pointer dereference",
            "Array bounds violation",
            "Missing class or dependency",
            "Method signature mismatch",
            "Invalid input parameters",
            "Runtime assertion failure",
            "Data validation error",
        ],
        recommendations: &[
            "Add null checks and defensive programming",
            "Validate array bounds before access",
            "Verify classpath and dependencies",
            "Check method signatures and versions",
            "Implement input validation",
            "Review business logic assertions",
            "Strengthen data validation rules",
        ],
    },
];

/// A category with its patterns compiled once.
pub struct CompiledCategory {
    pub def: &'static CategoryDefinition,
    patterns: Vec<(Regex, usize)>,
}

/// A category that matched a message, with its best pattern score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMatch {
    pub def: &'static CategoryDefinition,
    pub score: f64,
}

impl CategoryMatch {
    /// How many causes and recommendations this match contributes.
    pub fn take(&self) -> usize {
        if self.score > 0.7 {
            3
        } else if self.score > 0.5 {
            2
        } else {
            1
        }
    }
}

impl CompiledCategory {
    pub fn compile(def: &'static CategoryDefinition) -> Result<Self> {
        let patterns = def
            .patterns
            .iter()
            .map(|src| {
                let re = RegexBuilder::new(src)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("compiling {} pattern {src:?}", def.name))?;
                Ok((re, src.chars().count()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { def, patterns })
    }

    /// Best score across patterns, `None` if nothing matched.
    ///
    /// Per pattern: `min(1, matched_chars / message_chars + pattern_chars / 20)`.
    pub fn score(&self, message: &str) -> Option<f64> {
        let message_chars = message.chars().count();
        if message_chars == 0 {
            return None;
        }
        self.patterns
            .iter()
            .filter_map(|(re, pattern_chars)| {
                let m = re.find(message)?;
                let matched = m.as_str().chars().count() as f64;
                Some((matched / message_chars as f64 + *pattern_chars as f64 / 20.0).min(1.0))
            })
            .reduce(f64::max)
    }
}

pub fn compile_all() -> Result<Vec<CompiledCategory>> {
    CATEGORIES.iter().map(CompiledCategory::compile).collect()
}

/// Matching categories, highest score first; equal scores keep declaration order.
pub fn rank(categories: &[CompiledCategory], message: &str) -> Vec<CategoryMatch> {
    let mut matches: Vec<CategoryMatch> = categories
        .iter()
        .filter_map(|c| c.score(message).map(|score| CategoryMatch { def: c.def, score }))
        .collect();
    // sort_by is stable.
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}
