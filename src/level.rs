use serde::{Deserialize, Serialize};

/// Record severity. Ordered from the least to the most severe, so a
/// threshold admits a record when `record.level >= threshold`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl Default for Level {
    fn default() -> Self {
        Self::Debug
    }
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Level::Debug,
            "info" => Level::Info,
            "warn" | "warning" => Level::Warning,
            "error" => Level::Error,
            "critical" | "fatal" => Level::Critical,
            other => anyhow::bail!("unknown log level `{}`", other),
        };
        Ok(level)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordering() {
        let mut levels = vec![
            Level::Error,
            Level::Debug,
            Level::Critical,
            Level::Info,
            Level::Warning,
        ];
        levels.sort();

        assert_eq!(
            levels,
            vec![
                Level::Debug,
                Level::Info,
                Level::Warning,
                Level::Error,
                Level::Critical,
            ]
        );
    }

    #[test]
    fn parsing() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!(" WARN ".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Critical".parse::<Level>().unwrap(), Level::Critical);
        assert!("verbose".parse::<Level>().is_err());
    }
}
