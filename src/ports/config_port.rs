//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Comma-separated floats. `None` when the key is absent, `Err` with the
    /// offending token when any entry fails to parse.
    fn get_double_list(&self, section: &str, key: &str) -> Option<Result<Vec<f64>, String>> {
        let raw = self.get_string(section, key)?;
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<f64>().map_err(|_| s.to_string()))
                .collect(),
        )
    }
}
