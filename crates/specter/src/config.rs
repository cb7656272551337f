/// Run-level configuration, resolved from the environment.
///
/// `SPECTER_FILTER` restricts the compiled test list to full names containing
/// the given substring. `NO_COLOR` disables ANSI styling in the reporter.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub filter: Option<String>,
    pub color: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            filter: None,
            color: true,
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Self {
        let filter = std::env::var("SPECTER_FILTER")
            .ok()
            .filter(|f| !f.is_empty());
        let color = std::env::var("NO_COLOR").is_err();
        RunConfig { filter, color }
    }

    /// Whether a compiled test with this full name survives the filter.
    pub fn matches(&self, full_name: &str) -> bool {
        match &self.filter {
            Some(needle) => full_name.contains(needle.as_str()),
            None => true,
        }
    }
}
