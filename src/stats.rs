//! Case aggregation: totals, bracket histograms, name deduplication and
//! per-region time series.
//!
//! Everything here is a pure function of its arguments. Records only need to
//! expose a count per date key (see [`CaseCounts`]), so the same code runs over
//! decoded features, raw property maps, or references to either.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Case counts are signed so malformed negative values still bucket cleanly.
pub type Count = i64;

/// Anything that can report a case count for a date key
pub trait CaseCounts {
    /// Raw count for `date`, `None` when the record has no usable value
    fn count_on(&self, date: &str) -> Option<Count>;

    /// Count for `date`, with missing values read as zero
    fn cases_on(&self, date: &str) -> Count {
        self.count_on(date).unwrap_or(0)
    }
}

impl<T: CaseCounts + ?Sized> CaseCounts for &T {
    fn count_on(&self, date: &str) -> Option<Count> {
        (**self).count_on(date)
    }
}

impl CaseCounts for BTreeMap<String, Count> {
    fn count_on(&self, date: &str) -> Option<Count> {
        self.get(date).copied()
    }
}

impl CaseCounts for HashMap<String, Count> {
    fn count_on(&self, date: &str) -> Option<Count> {
        self.get(date).copied()
    }
}

/// Anything identified by a region name
pub trait Named {
    fn name(&self) -> &str;
}

impl<T: Named + ?Sized> Named for &T {
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Sum of every record's count on `date`
pub fn total_cases<I>(records: I, date: &str) -> Count
where
    I: IntoIterator,
    I::Item: CaseCounts,
{
    records
        .into_iter()
        .fold(0, |sum: Count, record| sum.saturating_add(record.cases_on(date)))
}

/// One labelled bucket with an exclusive upper bound (`None` = unbounded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bracket {
    pub label: String,
    pub upper: Option<Count>,
}

impl Bracket {
    pub fn below(label: impl Into<String>, upper: Count) -> Self {
        Self {
            label: label.into(),
            upper: Some(upper),
        }
    }

    pub fn unbounded(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            upper: None,
        }
    }
}

/// Ordered bracket table covering every integer exactly once.
///
/// Upper bounds strictly increase and only the last bracket is unbounded, so
/// "first bracket whose upper bound exceeds the count" always finds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brackets {
    brackets: Vec<Bracket>,
}

impl Brackets {
    pub fn new(brackets: Vec<Bracket>) -> Result<Self> {
        let Some((last, bounded)) = brackets.split_last() else {
            bail!("bracket table is empty");
        };
        if last.upper.is_some() {
            bail!("last bracket '{}' must be unbounded", last.label);
        }

        let mut previous: Option<Count> = None;
        for bracket in bounded {
            let Some(upper) = bracket.upper else {
                bail!("only the last bracket may be unbounded, found '{}'", bracket.label);
            };
            if let Some(prev) = previous {
                if upper <= prev {
                    bail!(
                        "bracket '{}' upper bound {} does not exceed previous bound {}",
                        bracket.label,
                        upper,
                        prev
                    );
                }
            }
            previous = Some(upper);
        }

        Ok(Self { brackets })
    }

    /// Index of the bracket `count` falls into
    pub fn index_of(&self, count: Count) -> usize {
        self.brackets
            .iter()
            .position(|b| b.upper.map_or(true, |upper| count < upper))
            .unwrap_or(self.brackets.len() - 1)
    }

    pub fn label_of(&self, count: Count) -> &str {
        &self.brackets[self.index_of(count)].label
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bracket> {
        self.brackets.iter()
    }
}

impl Default for Brackets {
    fn default() -> Self {
        Self {
            brackets: vec![
                Bracket::below("<500K", 500_000),
                Bracket::below("500K–1M", 1_000_000),
                Bracket::below("1M–2M", 2_000_000),
                Bracket::below("2M–4M", 4_000_000),
                Bracket::unbounded(">4M"),
            ],
        }
    }
}

/// Number of records per bracket, in bracket order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub bins: Vec<(String, usize)>,
}

impl Histogram {
    /// Count for a bracket label, 0 when the label is unknown
    pub fn get(&self, label: &str) -> usize {
        self.bins
            .iter()
            .find(|(l, _)| l == label)
            .map_or(0, |(_, n)| *n)
    }

    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.bins.iter().map(|(_, n)| *n)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.bins.iter().map(|(l, _)| l.as_str())
    }

    /// Total records counted; always equals the input length
    pub fn total(&self) -> usize {
        self.counts().sum()
    }
}

/// Bucket every record's count on `date` into `brackets`
pub fn histogram<I>(records: I, brackets: &Brackets, date: &str) -> Histogram
where
    I: IntoIterator,
    I::Item: CaseCounts,
{
    let mut counts = vec![0usize; brackets.len()];
    for record in records {
        counts[brackets.index_of(record.cases_on(date))] += 1;
    }

    Histogram {
        bins: brackets
            .iter()
            .zip(counts)
            .map(|(b, n)| (b.label.clone(), n))
            .collect(),
    }
}

/// Keep the first record per name, dropping later records with the same name
pub fn dedup_by_name<I>(records: I) -> Vec<I::Item>
where
    I: IntoIterator,
    I::Item: Named,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.name().to_owned()))
        .collect()
}

/// One value per entry of `dates`, in order, zero where the record has none
pub fn time_series<R, S>(record: &R, dates: &[S]) -> Vec<Count>
where
    R: CaseCounts + ?Sized,
    S: AsRef<str>,
{
    dates.iter().map(|d| record.cases_on(d.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "2022-06-06";

    #[derive(Debug, Clone, PartialEq)]
    struct Rec {
        name: &'static str,
        counts: BTreeMap<String, Count>,
    }

    impl Rec {
        fn new(name: &'static str, cases: Count) -> Self {
            Self {
                name,
                counts: BTreeMap::from([(DATE.to_string(), cases)]),
            }
        }

        fn blank(name: &'static str) -> Self {
            Self {
                name,
                counts: BTreeMap::new(),
            }
        }
    }

    impl CaseCounts for Rec {
        fn count_on(&self, date: &str) -> Option<Count> {
            self.counts.count_on(date)
        }
    }

    impl Named for Rec {
        fn name(&self) -> &str {
            self.name
        }
    }

    fn sample() -> Vec<Rec> {
        vec![
            Rec::new("A", 600_000),
            Rec::new("B", 200_000),
            Rec::blank("C"),
            Rec::new("D", 4_500_000),
            Rec::new("E", -3),
            Rec::new("F", 1_999_999),
        ]
    }

    #[test]
    fn test_total_treats_missing_as_zero() {
        let records = sample();
        let expected: Count = records.iter().map(|r| r.counts.get(DATE).copied().unwrap_or(0)).sum();
        assert_eq!(total_cases(&records, DATE), expected);
        assert_eq!(total_cases(&records, "1999-01-01"), 0);
    }

    #[test]
    fn test_total_is_repeatable() {
        let records = sample();
        let first = total_cases(&records, DATE);
        let _ = histogram(&records, &Brackets::default(), DATE);
        assert_eq!(total_cases(&records, DATE), first);
    }

    #[test]
    fn test_histogram_counts_every_record_once() {
        let brackets = Brackets::default();
        let records = sample();
        for n in 0..=records.len() {
            let h = histogram(&records[..n], &brackets, DATE);
            assert_eq!(h.total(), n);
            assert_eq!(h.bins.len(), brackets.len());
        }
    }

    #[test]
    fn test_boundaries_are_exclusive_upper_bounds() {
        let brackets = Brackets::default();
        assert_eq!(brackets.label_of(499_999), "<500K");
        assert_eq!(brackets.label_of(500_000), "500K–1M");
        assert_eq!(brackets.label_of(1_000_000), "1M–2M");
        assert_eq!(brackets.label_of(3_999_999), "2M–4M");
        assert_eq!(brackets.label_of(4_000_000), ">4M");
        assert_eq!(brackets.label_of(Count::MAX), ">4M");
    }

    #[test]
    fn test_negative_counts_fall_into_lowest_bracket() {
        assert_eq!(Brackets::default().label_of(-10), "<500K");
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<Rec> = Vec::new();
        assert_eq!(total_cases(&records, DATE), 0);

        let h = histogram(&records, &Brackets::default(), DATE);
        assert_eq!(h.bins.len(), 5);
        assert!(h.counts().all(|n| n == 0));
    }

    #[test]
    fn test_duplicate_fragment_scenario() {
        let rendered = vec![
            Rec::new("A", 600_000),
            Rec::new("B", 200_000),
            Rec::new("A", 600_000),
        ];
        let unique = dedup_by_name(&rendered);
        assert_eq!(unique.len(), 2);
        assert_eq!(total_cases(&unique, DATE), 800_000);

        let h = histogram(&unique, &Brackets::default(), DATE);
        assert_eq!(h.get("<500K"), 1);
        assert_eq!(h.get("500K–1M"), 1);
        assert_eq!(h.get("1M–2M"), 0);
        assert_eq!(h.get("2M–4M"), 0);
        assert_eq!(h.get(">4M"), 0);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let rendered = vec![Rec::new("A", 1), Rec::new("A", 2), Rec::new("B", 3)];
        let unique = dedup_by_name(rendered);
        assert_eq!(unique, vec![Rec::new("A", 1), Rec::new("B", 3)]);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rendered = vec![
            Rec::new("A", 1),
            Rec::new("B", 2),
            Rec::new("A", 1),
            Rec::new("C", 3),
            Rec::new("B", 2),
        ];
        let once = dedup_by_name(rendered);
        let twice = dedup_by_name(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_time_series_fills_gaps_with_zero() {
        let counts = BTreeMap::from([("2020-03-01".to_string(), 10)]);
        let dates = ["2020-03-01", "2020-06-01", "2020-09-01"];
        assert_eq!(time_series(&counts, &dates), vec![10, 0, 0]);
    }

    #[test]
    fn test_time_series_length_matches_dates() {
        let empty: HashMap<String, Count> = HashMap::new();
        let dates: Vec<String> = (1..=12).map(|m| format!("2021-{m:02}-01")).collect();
        assert_eq!(time_series(&empty, &dates).len(), dates.len());
        assert!(time_series(&empty, &[] as &[&str]).is_empty());
    }

    #[test]
    fn test_brackets_reject_bad_tables() {
        assert!(Brackets::new(vec![]).is_err());
        assert!(Brackets::new(vec![Bracket::below("a", 10)]).is_err());
        assert!(Brackets::new(vec![
            Bracket::below("a", 10),
            Bracket::below("b", 10),
            Bracket::unbounded("c"),
        ])
        .is_err());
        assert!(Brackets::new(vec![
            Bracket::unbounded("a"),
            Bracket::unbounded("b"),
        ])
        .is_err());
        assert!(Brackets::new(vec![Bracket::unbounded("all")]).is_ok());
    }
}
