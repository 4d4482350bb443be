// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;

#[parameterized(
    unset_uses_default = { None, "warn", "warn" },
    directives_win = { Some("debug"), "info", "debug" },
    per_target = { Some("trkd=trace"), "info", "trkd=trace" },
)]
fn filter_prefers_directives_over_default(directives: Option<&str>, default: &str, expected: &str) {
    assert_eq!(filter_from(directives, default).to_string(), expected);
}
