/// Naming and output options for flat rows.
#[derive(Debug, Clone)]
pub struct MeltConfig {
    /// Separator between a nested field's path segments, e.g. `origin_x`
    pub separator: String,

    /// Name of the leading field-set column of a partial top-level row
    pub field_set_column: String,

    /// Whether writers emit a header row of column names first
    pub header: bool,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            separator: String::from("_"),
            field_set_column: String::from("_fields"),
            header: false,
        }
    }
}

impl MeltConfig {
    pub(crate) fn join(&self, prefix: &str, name: &str) -> String {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", prefix, self.separator, name)
        }
    }
}
