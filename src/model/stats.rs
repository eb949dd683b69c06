use std::collections::HashMap;

use serde::Deserialize;

/// The four percentile ranks the scheduler reports per job.
///
/// `Display` yields the label used in the stats endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    Median,
    P75,
    P95,
    P99,
}

impl Rank {
    pub const ALL: [Rank; 4] = [Rank::Median, Rank::P75, Rank::P95, Rank::P99];

    pub fn path_label(&self) -> &'static str {
        match self {
            Rank::Median => "median",
            Rank::P75 => "75thPercentile",
            Rank::P95 => "95thPercentile",
            Rank::P99 => "99thPercentile",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_label())
    }
}

/// One `{jobNameLabel, time}` pair from a stats response.
#[derive(Debug, Deserialize)]
pub struct RawStat {
    #[serde(rename = "jobNameLabel")]
    pub job_name_label: String,
    pub time: f64,
}

/// Job name to per-rank latency readings. Rebuilt on every aggregation,
/// never persisted.
pub type StatsIndex = HashMap<String, HashMap<Rank, f64>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_path_labels() {
        assert_eq!(Rank::Median.path_label(), "median");
        assert_eq!(Rank::P75.path_label(), "75thPercentile");
        assert_eq!(Rank::P95.path_label(), "95thPercentile");
        assert_eq!(Rank::P99.path_label(), "99thPercentile");
    }

    #[test]
    fn rank_display_matches_path_label() {
        for rank in Rank::ALL {
            assert_eq!(rank.to_string(), rank.path_label());
        }
    }

    #[test]
    fn raw_stat_parses() {
        let stat: RawStat =
            serde_json::from_str(r#"{"jobNameLabel": "etl_nightly", "time": 123.4}"#).unwrap();
        assert_eq!(stat.job_name_label, "etl_nightly");
        assert!((stat.time - 123.4).abs() < f64::EPSILON);
    }
}
