//! `collect[]` / `exclude[]` query handling.

use nodeprism_core::error::{PrismError, Result};

const COLLECT_KEY: &str = "collect[]";
const EXCLUDE_KEY: &str = "exclude[]";

/// Raw filter sets read from one request's query string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub collects: Vec<String>,
    pub excludes: Vec<String>,
}

/// Validated filter for one scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeFilter {
    Unfiltered,
    Collect(Vec<String>),
    Exclude(Vec<String>),
}

impl FilterSpec {
    /// Collect repeated `collect[]` and `exclude[]` values, in query order.
    pub fn from_query(raw: Option<&str>) -> Self {
        let mut spec = Self::default();
        let Some(raw) = raw else {
            return spec;
        };
        for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
            match k.as_ref() {
                COLLECT_KEY => spec.collects.push(v.into_owned()),
                EXCLUDE_KEY => spec.excludes.push(v.into_owned()),
                _ => {}
            }
        }
        spec
    }

    pub fn into_filter(self) -> Result<ScrapeFilter> {
        match (self.collects.is_empty(), self.excludes.is_empty()) {
            (true, true) => Ok(ScrapeFilter::Unfiltered),
            (false, false) => Err(PrismError::CombinedFilters),
            (false, true) => Ok(ScrapeFilter::Collect(self.collects)),
            (true, false) => Ok(ScrapeFilter::Exclude(self.excludes)),
        }
    }
}

impl ScrapeFilter {
    /// Collector names to build for this scrape.
    ///
    /// Collect lists pass through verbatim; validity is checked when the
    /// collectors are built. Exclude lists keep the order of `enabled`.
    pub fn resolve(self, enabled: &[String]) -> Vec<String> {
        match self {
            ScrapeFilter::Unfiltered => enabled.to_vec(),
            ScrapeFilter::Collect(names) => names,
            ScrapeFilter::Exclude(excludes) => enabled
                .iter()
                .filter(|c| !excludes.contains(c))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn repeated_keys_are_collected_in_order() {
        let spec = FilterSpec::from_query(Some("collect[]=cpu&foo=1&collect[]=meminfo"));
        assert_eq!(spec.collects, names(&["cpu", "meminfo"]));
        assert!(spec.excludes.is_empty());
    }

    #[test]
    fn percent_encoded_brackets_are_understood() {
        let spec = FilterSpec::from_query(Some("exclude%5B%5D=disk"));
        assert_eq!(spec.excludes, names(&["disk"]));
    }

    #[test]
    fn no_query_means_unfiltered() {
        assert_eq!(FilterSpec::from_query(None).into_filter().unwrap(), ScrapeFilter::Unfiltered);
        assert_eq!(
            FilterSpec::from_query(Some("")).into_filter().unwrap(),
            ScrapeFilter::Unfiltered
        );
    }

    #[test]
    fn both_lists_are_rejected() {
        let err = FilterSpec::from_query(Some("collect[]=cpu&exclude[]=cpu"))
            .into_filter()
            .unwrap_err();
        assert!(matches!(err, PrismError::CombinedFilters));
    }

    #[test]
    fn exclude_preserves_enabled_order() {
        let enabled = names(&["cpu", "disk", "meminfo"]);
        let filters = ScrapeFilter::Exclude(names(&["disk"])).resolve(&enabled);
        assert_eq!(filters, names(&["cpu", "meminfo"]));
    }

    #[test]
    fn collect_passes_through_verbatim() {
        let enabled = names(&["cpu"]);
        let filters = ScrapeFilter::Collect(names(&["bogus", "cpu"])).resolve(&enabled);
        assert_eq!(filters, names(&["bogus", "cpu"]));
    }
}
