use std::collections::BTreeMap;

use serde::Serialize;

/// Per-tick diagnostic sink.
pub trait Recorder {
    fn record(&mut self, series: &str, value: f64);
}

/// In-memory named series, one value appended per `record` call.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SeriesRecorder {
    series: BTreeMap<String, Vec<f64>>,
}

impl SeriesRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl Recorder for SeriesRecorder {
    fn record(&mut self, series: &str, value: f64) {
        match self.series.get_mut(series) {
            Some(values) => values.push(value),
            None => {
                self.series.insert(series.to_string(), vec![value]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut rec = SeriesRecorder::new();
        rec.record("price", 1.0);
        rec.record("forecast", 1.5);
        rec.record("price", 2.0);

        assert_eq!(rec.series("price"), Some(&[1.0, 2.0][..]));
        assert_eq!(rec.series("forecast"), Some(&[1.5][..]));
        assert_eq!(rec.series("missing"), None);
        assert_eq!(rec.names().collect::<Vec<_>>(), vec!["forecast", "price"]);
    }

    #[test]
    fn test_serializes_as_map() {
        let mut rec = SeriesRecorder::new();
        rec.record("price", 3.0);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"price":[3.0]}"#);
    }
}
