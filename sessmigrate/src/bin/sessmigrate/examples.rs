/// Help examples, grouped by intent: `(group, [(command, effect)])`.
pub const EXAMPLES: &[(&str, &[(&str, &str)])] = &[
    (
        "Migrate",
        &[
            ("sessmigrate", "use DATABASE_URL and REDIS_URL"),
            ("sessmigrate --key-prefix session", "store keys as session:<key>"),
            ("sessmigrate --table auth.django_session", "read a schema-qualified table"),
        ],
    ),
    (
        "Preview",
        &[
            ("sessmigrate --dry-run", "count writes without touching Redis"),
            ("sessmigrate --dry-run --output json", "machine-readable summary"),
        ],
    ),
    (
        "Tuning",
        &[
            ("sessmigrate --chunk-size 50000 --page-size 5000", "fewer, larger flushes"),
            ("RUST_LOG=sessmigrate=debug sessmigrate --plain", "page and flush logging"),
        ],
    ),
];

/// Widest command across every group, for aligning the effect column.
pub fn command_width() -> usize {
    EXAMPLES
        .iter()
        .flat_map(|(_, commands)| commands.iter())
        .map(|(command, _)| command.len())
        .max()
        .unwrap_or(0)
}
