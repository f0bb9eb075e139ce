//! Sequence grouping
//!
//! Photos shot in one burst share their capture settings and are taken a few
//! seconds apart. Grouping sorts the table, splits it wherever the clock
//! jumps by more than the threshold, then chains every run of photos that
//! agree on both the settings and the time group.

use crate::types::{CaptureAttributes, PhotoRecord};
use std::collections::HashMap;

/// Sort `records` and assign `time_group`, `prev` and `next`.
///
/// Existing links are discarded. A gap strictly greater than
/// `time_threshold` seconds starts a new time group.
pub fn group(records: &mut [PhotoRecord], time_threshold: i64) {
    records.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.capture_time.cmp(&b.capture_time))
    });

    let mut time_group = 0;
    let mut last_time = None;
    for record in records.iter_mut() {
        if let Some(last) = last_time {
            if record.capture_time - last > time_threshold {
                time_group += 1;
            }
        }
        last_time = Some(record.capture_time);
        record.time_group = time_group;
        record.prev = None;
        record.next = None;
    }

    for cluster in clusters(records) {
        for pair in cluster.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            records[a].next = Some(records[b].name.clone());
            records[b].prev = Some(records[a].name.clone());
        }
    }
}

/// Indices of records sharing settings and time group, in first-seen order
fn clusters(records: &[PhotoRecord]) -> Vec<Vec<usize>> {
    let mut position: HashMap<(&CaptureAttributes, i64), usize> = HashMap::new();
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let key = (&record.capture_attributes, record.time_group);
        let slot = *position.entry(key).or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[slot].push(index);
    }

    clusters
}

/// First name that occurs twice in a name-sorted slice
pub fn first_duplicate(records: &[PhotoRecord]) -> Option<&str> {
    records
        .windows(2)
        .find(|pair| pair[0].name == pair[1].name)
        .map(|pair| pair[0].name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, time: i64, fnumber: &str) -> PhotoRecord {
        PhotoRecord {
            name: name.to_string(),
            capture_time: time,
            capture_attributes: CaptureAttributes::from([
                ("FNumber".to_string(), fnumber.to_string()),
                ("ISOSpeedRatings".to_string(), "100".to_string()),
            ]),
            ..Default::default()
        }
    }

    fn links(records: &[PhotoRecord]) -> Vec<(Option<&str>, Option<&str>)> {
        records
            .iter()
            .map(|r| (r.prev.as_deref(), r.next.as_deref()))
            .collect()
    }

    #[test]
    fn test_two_bursts() {
        let mut records: Vec<_> = [("IMG1", 0), ("IMG2", 5), ("IMG3", 5), ("IMG4", 40), ("IMG5", 42)]
            .into_iter()
            .map(|(n, t)| record(n, t, "F8"))
            .collect();

        group(&mut records, 15);

        let groups: Vec<i64> = records.iter().map(|r| r.time_group).collect();
        assert_eq!(groups, vec![0, 0, 0, 1, 1]);
        assert_eq!(
            links(&records),
            vec![
                (None, Some("IMG2")),
                (Some("IMG1"), Some("IMG3")),
                (Some("IMG2"), None),
                (None, Some("IMG5")),
                (Some("IMG4"), None),
            ]
        );
    }

    #[test]
    fn test_sorts_by_name_then_time() {
        let mut records = vec![record("C", 2, "F8"), record("A", 0, "F8"), record("B", 1, "F8")];
        group(&mut records, 15);

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(records[0].next.as_deref(), Some("B"));
        assert_eq!(records[2].prev.as_deref(), Some("B"));
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_in_group() {
        let mut records = vec![record("A", 0, "F8"), record("B", 15, "F8"), record("C", 31, "F8")];
        group(&mut records, 15);

        let groups: Vec<i64> = records.iter().map(|r| r.time_group).collect();
        assert_eq!(groups, vec![0, 0, 1]);
        assert!(records[2].is_standalone());
    }

    #[test]
    fn test_backwards_clock_does_not_break_group() {
        // Names sort before times, so the gap may be negative
        let mut records = vec![record("A", 100, "F8"), record("B", 10, "F8")];
        group(&mut records, 15);

        assert_eq!(records[1].time_group, 0);
        assert_eq!(records[0].next.as_deref(), Some("B"));
    }

    #[test]
    fn test_settings_and_time_group_apply_jointly() {
        // A and C share settings but B sits between them with different ones
        let mut records = vec![
            record("A", 0, "F8"),
            record("B", 1, "F4"),
            record("C", 2, "F8"),
            record("D", 3, "F4"),
        ];
        group(&mut records, 15);

        assert_eq!(records[0].next.as_deref(), Some("C"));
        assert_eq!(records[2].prev.as_deref(), Some("A"));
        assert_eq!(records[1].next.as_deref(), Some("D"));
        assert_eq!(records[3].prev.as_deref(), Some("B"));
    }

    #[test]
    fn test_same_settings_different_time_groups() {
        let mut records = vec![record("A", 0, "F8"), record("B", 100, "F8")];
        group(&mut records, 15);

        assert!(records.iter().all(PhotoRecord::is_standalone));
        assert_eq!(records[1].time_group, 1);
    }

    #[test]
    fn test_regroup_clears_old_links() {
        let mut records = vec![record("A", 0, "F8"), record("B", 100, "F8")];
        records[0].next = Some("B".to_string());
        records[1].prev = Some("A".to_string());

        group(&mut records, 15);
        assert!(records.iter().all(PhotoRecord::is_standalone));
    }

    #[test]
    fn test_links_are_symmetric() {
        let mut records: Vec<_> = (0..20)
            .map(|i| record(&format!("IMG{:02}", i), i * 7, if i % 3 == 0 { "F8" } else { "F4" }))
            .collect();
        group(&mut records, 10);

        for record in &records {
            if let Some(next) = &record.next {
                let partner = records.iter().find(|r| &r.name == next).expect("partner exists");
                assert_eq!(partner.prev.as_deref(), Some(record.name.as_str()));
            }
            if let Some(prev) = &record.prev {
                let partner = records.iter().find(|r| &r.name == prev).expect("partner exists");
                assert_eq!(partner.next.as_deref(), Some(record.name.as_str()));
            }
        }
    }

    #[test]
    fn test_empty_and_single() {
        let mut empty: Vec<PhotoRecord> = Vec::new();
        group(&mut empty, 15);
        assert!(empty.is_empty());

        let mut single = vec![record("A", 0, "F8")];
        group(&mut single, 15);
        assert!(single[0].is_standalone());
        assert_eq!(single[0].time_group, 0);
    }

    #[test]
    fn test_first_duplicate() {
        let mut records = vec![record("B", 0, "F8"), record("A", 1, "F8"), record("B", 2, "F8")];
        records.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(first_duplicate(&records), Some("B"));

        let unique = vec![record("A", 0, "F8"), record("B", 0, "F8")];
        assert_eq!(first_duplicate(&unique), None);
    }
}
