//! Scalar outputs shown next to the viewport (panel counts, areas, angles).

use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Count,
    Area,
    Angle,
    TotalCount,
    TotalArea,
}

impl MetricKind {
    pub fn label(self, value: Option<f64>) -> String {
        let v = match value {
            Some(v) => v.to_string(),
            None => "-".to_string(),
        };
        match self {
            MetricKind::Count => format!("Number = {v} units"),
            MetricKind::Area => format!("Area = {v} m2"),
            MetricKind::Angle => format!("Angle = {v} º"),
            MetricKind::TotalCount => format!("Total Number of Panels = {v} units"),
            MetricKind::TotalArea => format!("Total Area of Panels = {v} m2"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MetricSlot {
    /// Solver output feeding this slot.
    pub output: &'static str,
    /// Display id.
    pub id: &'static str,
    pub kind: MetricKind,
}

const fn slot(output: &'static str, id: &'static str, kind: MetricKind) -> MetricSlot {
    MetricSlot { output, id, kind }
}

/// Recognized outputs, in display order.
pub const METRICS: &[MetricSlot] = &[
    slot("RH_OUT:PAnum", "PAnum", MetricKind::Count),
    slot("RH_OUT:PAarea", "PAarea", MetricKind::Area),
    slot("RH_OUT:PAangle", "PAangle", MetricKind::Angle),
    slot("RH_OUT:PBnum", "PBnum", MetricKind::Count),
    slot("RH_OUT:PBarea", "PBarea", MetricKind::Area),
    slot("RH_OUT:PBangle", "PBangle", MetricKind::Angle),
    slot("RH_OUT:PCnum", "PCnum", MetricKind::Count),
    slot("RH_OUT:PCarea", "PCarea", MetricKind::Area),
    slot("RH_OUT:PCangle", "PCangle", MetricKind::Angle),
    slot("RH_OUT:PDnum", "PDnum", MetricKind::Count),
    slot("RH_OUT:PDarea", "PDarea", MetricKind::Area),
    slot("RH_OUT:PDangle", "PDangle", MetricKind::Angle),
    slot("RH_OUT:PTnum", "PTnum", MetricKind::TotalCount),
    slot("RH_OUT:PTarea", "PTarea", MetricKind::TotalArea),
];

pub fn lookup(output: &str) -> Option<&'static MetricSlot> {
    METRICS.iter().find(|m| m.output == output)
}

/// Rounds half-way cases towards positive infinity (`-2.5 → -2`).
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Reads an item payload as a number: `"12.7"`, `12.7` or `" 12.7 "`.
pub fn parse_scalar(raw: &str) -> Option<f64> {
    let text = raw.trim();
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .trim();
    if text.is_empty() {
        // empty payloads coerce to zero on the page
        return Some(0.0);
    }
    text.parse::<f64>().ok().filter(|x| x.is_finite())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedMetrics {
    values: BTreeMap<&'static str, f64>,
}

impl NamedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `raw` under `slot`, rounded. Returns false for non-numeric payloads.
    pub fn record(&mut self, slot: &MetricSlot, raw: &str) -> bool {
        match parse_scalar(raw) {
            Some(x) => {
                let value = round_half_up(x);
                log::debug!("{} = {value}", slot.id);
                self.values.insert(slot.id, value);
                true
            }
            None => {
                log::warn!("{}: payload {raw:?} is not a number", slot.output);
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied()
    }

    /// `(id, text)` pairs for every slot, in display order.
    pub fn display_lines(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        METRICS.iter().map(|m| (m.id, m.kind.label(self.get(m.id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_has_twelve_panel_metrics_and_two_totals() {
        assert_eq!(METRICS.len(), 14);
        let totals = METRICS
            .iter()
            .filter(|m| matches!(m.kind, MetricKind::TotalCount | MetricKind::TotalArea))
            .count();
        assert_eq!(totals, 2);
        for m in METRICS {
            assert_eq!(m.output.strip_prefix("RH_OUT:"), Some(m.id));
        }
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(lookup("RH_OUT:PBarea").map(|m| m.id), Some("PBarea"));
        assert!(lookup("RH_OUT:pbarea").is_none());
        assert!(lookup("PBarea").is_none());
    }

    #[test]
    fn rounding_matches_page_behaviour() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(41.49), 41.0);
    }

    #[test]
    fn parses_plain_and_quoted_numbers() {
        assert_eq!(parse_scalar("12.7"), Some(12.7));
        assert_eq!(parse_scalar("\"12.7\""), Some(12.7));
        assert_eq!(parse_scalar("  3 "), Some(3.0));
        assert_eq!(parse_scalar(""), Some(0.0));
        assert_eq!(parse_scalar("{\"x\":1}"), None);
        assert_eq!(parse_scalar("abc"), None);
    }

    #[test]
    fn last_record_wins() {
        let slot = lookup("RH_OUT:PTnum").unwrap();
        let mut metrics = NamedMetrics::new();
        assert!(metrics.record(slot, "10.2"));
        assert!(metrics.record(slot, "11.6"));
        assert!(!metrics.record(slot, "oops"));
        assert_eq!(metrics.get("PTnum"), Some(12.0));
    }

    #[test]
    fn labels_follow_metric_kind() {
        let mut metrics = NamedMetrics::new();
        metrics.record(lookup("RH_OUT:PAarea").unwrap(), "19.6");
        let lines: Vec<_> = metrics.display_lines().collect();
        assert_eq!(lines[1], ("PAarea", "Area = 20 m2".to_string()));
        assert_eq!(lines[0], ("PAnum", "Number = - units".to_string()));
        assert_eq!(lines[13].1, "Total Area of Panels = - m2");
    }
}
