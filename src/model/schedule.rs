use chrono::{DateTime, SecondsFormat, Utc};

/// An ISO-8601 repeating-interval expression: `R<n>/<start>/<period>`.
///
/// A bare `R` repeats forever. The period keeps its wire form (a
/// `P`-prefixed duration designator); the scheduler is the source of truth
/// for finer period validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub repeats: Option<u32>,
    pub start: DateTime<Utc>,
    pub period: String,
}

impl std::str::FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (repeat, start, period) = match (parts.next(), parts.next(), parts.next()) {
            (Some(r), Some(s), Some(p)) => (r, s, p),
            _ => return Err(format!("expected R<n>/<start>/<period>, got {:?}", s)),
        };

        let repeats = match repeat.strip_prefix('R') {
            Some("") => None,
            Some(count) => Some(
                count
                    .parse::<u32>()
                    .map_err(|_| format!("bad repeat count {:?}", repeat))?,
            ),
            None => return Err(format!("schedule must start with R, got {:?}", repeat)),
        };

        let start = DateTime::parse_from_rfc3339(start)
            .map_err(|e| format!("bad start {:?}: {}", start, e))?
            .with_timezone(&Utc);

        if !period.starts_with('P') || period.len() < 2 {
            return Err(format!("bad period {:?}", period));
        }

        Ok(Schedule {
            repeats,
            start,
            period: period.to_string(),
        })
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.repeats {
            Some(n) => write!(f, "R{}", n)?,
            None => write!(f, "R")?,
        }
        write!(
            f,
            "/{}/{}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.period
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_bounded_schedule() {
        let schedule: Schedule = "R5/2024-01-01T00:00:00Z/P1D".parse().unwrap();
        assert_eq!(schedule.repeats, Some(5));
        assert_eq!(schedule.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(schedule.period, "P1D");
    }

    #[test]
    fn parses_unbounded_schedule() {
        let schedule: Schedule = "R/2024-06-15T08:30:00Z/PT30M".parse().unwrap();
        assert_eq!(schedule.repeats, None);
        assert_eq!(schedule.period, "PT30M");
    }

    #[test]
    fn display_round_trips() {
        for s in ["R5/2024-01-01T00:00:00Z/P1D", "R/2024-06-15T08:30:00Z/PT30M"] {
            let schedule: Schedule = s.parse().unwrap();
            assert_eq!(schedule.to_string(), s);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Schedule>().is_err());
        assert!("daily at noon".parse::<Schedule>().is_err());
        assert!("5/2024-01-01T00:00:00Z/P1D".parse::<Schedule>().is_err());
        assert!("R5/yesterday/P1D".parse::<Schedule>().is_err());
        assert!("R5/2024-01-01T00:00:00Z/1D".parse::<Schedule>().is_err());
        assert!("R5/2024-01-01T00:00:00Z/P".parse::<Schedule>().is_err());
        assert!("Rfive/2024-01-01T00:00:00Z/P1D".parse::<Schedule>().is_err());
    }
}
