use super::{expand_opt, Task};
use crate::error::BuildResult;
use crate::project::Project;
use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;

/// Sets `DSTAMP`, `TSTAMP` and `TODAY` from the current time
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TstampTask {
    /// Prefix for the property names, e.g. `start` gives `start.DSTAMP`
    #[serde(default)]
    pub prefix: Option<String>,
}

impl TstampTask {
    /// Property values for a point in time
    pub fn stamps<Tz: TimeZone>(now: &DateTime<Tz>) -> [(&'static str, String); 3]
    where
        Tz::Offset: std::fmt::Display,
    {
        [
            ("DSTAMP", now.format("%Y%m%d").to_string()),
            ("TSTAMP", now.format("%H%M").to_string()),
            ("TODAY", now.format("%B %-d %Y").to_string()),
        ]
    }
}

impl Task for TstampTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let prefix = expand_opt(project, &self.prefix)
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}.", p.trim_end_matches('.')))
            .unwrap_or_default();

        for (name, value) in Self::stamps(&Local::now()) {
            project.set_new_property(format!("{}{}", prefix, name), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_stamp_formats() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        let stamps = TstampTask::stamps(&at);
        assert_eq!(stamps[0], ("DSTAMP", "20240307".to_string()));
        assert_eq!(stamps[1], ("TSTAMP", "0905".to_string()));
        assert_eq!(stamps[2], ("TODAY", "March 7 2024".to_string()));
    }
}
