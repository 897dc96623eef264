use std::path::Path;

use crate::feed::{DataFeed, FeedError, Interval, PriceField};
use crate::signal::PricePoint;

/// Struct-of-Arrays bar storage for one instrument.
///
/// All vectors are parallel: index `i` across all fields represents one bar.
/// Two CSV layouts are accepted: `timestamp,open,high,low,close,volume` and
/// the plain `timestamp,price` series, where every OHLC field is the price.
#[derive(Debug, Clone, Default)]
pub struct CandleStore {
    pub timestamps: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(cap),
            open: Vec::with_capacity(cap),
            high: Vec::with_capacity(cap),
            low: Vec::with_capacity(cap),
            close: Vec::with_capacity(cap),
            volume: Vec::with_capacity(cap),
        }
    }

    /// Build a store from a close-only series.
    pub fn from_points(points: &[PricePoint]) -> Self {
        let mut store = Self::with_capacity(points.len());
        for p in points {
            store.push(p.timestamp, p.price, p.price, p.price, p.price, 0.0);
        }
        store
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) {
        self.timestamps.push(ts);
        self.open.push(o);
        self.high.push(h);
        self.low.push(l);
        self.close.push(c);
        self.volume.push(v);
    }

    pub fn column(&self, field: PriceField) -> &[f64] {
        match field {
            PriceField::Open => &self.open,
            PriceField::High => &self.high,
            PriceField::Low => &self.low,
            PriceField::Close => &self.close,
        }
    }

    /// The whole series for `field` as timestamped points.
    pub fn price_points(&self, field: PriceField) -> Vec<PricePoint> {
        self.timestamps
            .iter()
            .zip(self.column(field))
            .map(|(&ts, &price)| PricePoint::new(ts, price))
            .collect()
    }

    /// Smallest positive spacing between consecutive bars.
    ///
    /// Weekend and holiday gaps in daily data are longer than one bar, so the
    /// minimum is the native interval.
    pub fn bar_interval(&self) -> Option<Interval> {
        self.timestamps
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&d| d > 0)
            .min()
            .map(Interval::from_seconds)
    }

    /// Load bars from a CSV file using memory-mapped I/O.
    ///
    /// Timestamps may be unix seconds, `2025-11-08`, `2025-11-08T00:00:00Z`
    /// or `2024-02-08T00:00:00+00:00`.
    pub fn from_csv(path: &Path) -> Result<Self, FeedError> {
        let file = std::fs::File::open(path).map_err(|e| FeedError::Io(e.to_string()))?;
        let mmap =
            unsafe { memmap2::Mmap::map(&file) }.map_err(|e| FeedError::Io(e.to_string()))?;

        Self::parse_csv_bytes(&mmap[..])
    }

    /// Parse CSV from raw bytes (testable without files).
    pub fn parse_csv_bytes(data: &[u8]) -> Result<Self, FeedError> {
        // ~30 bytes per row for close-only daily data
        let mut store = Self::with_capacity(data.len() / 30);
        let len = data.len();

        // Skip header row
        let mut pos = match memchr::memchr(b'\n', data) {
            Some(nl) => nl + 1,
            None => return Ok(store),
        };

        while pos < len {
            let line_end = memchr::memchr(b'\n', &data[pos..])
                .map(|i| pos + i)
                .unwrap_or(len);

            let line = &data[pos..line_end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if !line.is_empty() {
                Self::parse_row(line, &mut store)?;
            }

            pos = line_end + 1;
        }

        if !store.is_empty() {
            let mut indices: Vec<usize> = (0..store.len()).collect();
            indices.sort_by_key(|&i| store.timestamps[i]);
            return Ok(Self::reorder(&store, &indices));
        }

        Ok(store)
    }

    fn parse_row(line: &[u8], store: &mut CandleStore) -> Result<(), FeedError> {
        let fields: Vec<&[u8]> = line.split(|&b| b == b',').collect();

        let ts = Self::parse_timestamp(fields[0])?;
        match fields.len() {
            2 => {
                let price = Self::parse_field(fields[1], "price")?;
                store.push(ts, price, price, price, price, 0.0);
            }
            6 => {
                let o = Self::parse_field(fields[1], "open")?;
                let h = Self::parse_field(fields[2], "high")?;
                let l = Self::parse_field(fields[3], "low")?;
                let c = Self::parse_field(fields[4], "close")?;
                let v = Self::parse_field(fields[5], "volume")?;
                store.push(ts, o, h, l, c, v);
            }
            n => {
                return Err(FeedError::Parse(format!(
                    "Expected 2 or 6 columns, got {}",
                    n
                )))
            }
        }
        Ok(())
    }

    #[inline]
    fn parse_field(bytes: &[u8], name: &str) -> Result<f64, FeedError> {
        fast_float::parse(bytes.trim_ascii()).map_err(|_| FeedError::Parse(format!("bad {}", name)))
    }

    /// Parse a timestamp cell to Unix epoch seconds.
    fn parse_timestamp(bytes: &[u8]) -> Result<i64, FeedError> {
        let bytes = bytes.trim_ascii();

        // Plain unix seconds
        if !bytes.contains(&b'-') && !bytes.contains(&b'T') {
            return fast_float::parse::<f64, _>(bytes)
                .map(|ts| ts as i64)
                .map_err(|_| {
                    FeedError::Parse(format!("bad timestamp: {}", String::from_utf8_lossy(bytes)))
                });
        }

        if bytes.len() < 10 {
            return Err(FeedError::Parse(format!(
                "timestamp too short: {}",
                String::from_utf8_lossy(bytes)
            )));
        }

        // Fixed-offset fields below slice by byte
        if !bytes.is_ascii() {
            return Err(FeedError::Parse(format!(
                "non-ASCII timestamp: {}",
                String::from_utf8_lossy(bytes)
            )));
        }
        let s = std::str::from_utf8(bytes)
            .map_err(|_| FeedError::Parse("non-UTF8 timestamp".into()))?;

        let year: i32 = s[0..4]
            .parse()
            .map_err(|_| FeedError::Parse("bad year".into()))?;
        let month: u32 = s[5..7]
            .parse()
            .map_err(|_| FeedError::Parse("bad month".into()))?;
        let day: u32 = s[8..10]
            .parse()
            .map_err(|_| FeedError::Parse("bad day".into()))?;

        // Date-only rows are daily bars at midnight UTC
        let (hour, minute, second) = if s.len() >= 19 {
            let hour: u32 = s[11..13]
                .parse()
                .map_err(|_| FeedError::Parse("bad hour".into()))?;
            let minute: u32 = s[14..16]
                .parse()
                .map_err(|_| FeedError::Parse("bad minute".into()))?;
            let second: u32 = s[17..19]
                .parse()
                .map_err(|_| FeedError::Parse("bad second".into()))?;
            (hour, minute, second)
        } else {
            (0, 0, 0)
        };

        let days = days_from_civil(year, month, day);
        Ok(days * 86_400 + hour as i64 * 3_600 + minute as i64 * 60 + second as i64)
    }

    fn reorder(store: &CandleStore, indices: &[usize]) -> CandleStore {
        let mut result = CandleStore::with_capacity(indices.len());
        for &i in indices {
            result.push(
                store.timestamps[i],
                store.open[i],
                store.high[i],
                store.low[i],
                store.close[i],
                store.volume[i],
            );
        }
        result
    }

    /// Get a sub-slice view as a new CandleStore (copies data).
    pub fn slice(&self, start: usize, end: usize) -> CandleStore {
        let end = end.min(self.len());
        let start = start.min(end);
        CandleStore {
            timestamps: self.timestamps[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }
}

impl DataFeed for CandleStore {
    fn history(
        &self,
        window_size: usize,
        interval: Interval,
        field: PriceField,
    ) -> Result<Vec<PricePoint>, FeedError> {
        if let Some(native) = self.bar_interval() {
            if native != interval {
                return Err(FeedError::UnsupportedInterval {
                    requested: interval,
                    native,
                });
            }
        }
        if self.len() < window_size {
            return Err(FeedError::InsufficientData {
                requested: window_size,
                available: self.len(),
            });
        }
        let start = self.len() - window_size;
        Ok(self.timestamps[start..]
            .iter()
            .zip(&self.column(field)[start..])
            .map(|(&ts, &price)| PricePoint::new(ts, price))
            .collect())
    }
}

/// Convert civil date to days since Unix epoch (Howard Hinnant algorithm).
fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year } as i64;
    let m = if month <= 2 {
        month as i64 + 9
    } else {
        month as i64 - 3
    };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let doy = (153 * m as u64 + 2) / 5 + day as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}
