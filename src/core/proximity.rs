//! Nearby-complaint lookup.
//!
//! Distance is plain Euclidean distance in raw `(lat, lon)` degree space.
//! 0.005 degrees is roughly 500 m at mid latitudes; the error grows toward
//! the poles because longitude compression is not compensated.

use crate::complaint::{Complaint, Coordinates};

/// Degree-space radius below which two complaints count as nearby.
pub const NEARBY_THRESHOLD_DEG: f64 = 0.005;

/// Default number of neighbors shown in the detail panel.
pub const DEFAULT_NEARBY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub threshold: f64,
    pub limit: usize,
}

impl Default for NearbyQuery {
    fn default() -> Self {
        Self {
            threshold: NEARBY_THRESHOLD_DEG,
            limit: DEFAULT_NEARBY_LIMIT,
        }
    }
}

#[inline]
pub fn degree_distance(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = a.lat() - b.lat();
    let dlon = a.lon() - b.lon();
    (dlat * dlat + dlon * dlon).sqrt()
}

/// Up to `limit` complaints from `all` strictly closer than the default
/// threshold to `target`, in their original order.
///
/// `target` is excluded by identity: pass a reference into `all` to skip it.
/// A value-equal complaint stored in another slot is still returned.
pub fn nearby<'a>(target: &Complaint, all: &'a [Complaint], limit: usize) -> Vec<&'a Complaint> {
    nearby_with(
        target,
        all,
        NearbyQuery {
            limit,
            ..NearbyQuery::default()
        },
    )
}

pub fn nearby_with<'a>(
    target: &Complaint,
    all: &'a [Complaint],
    query: NearbyQuery,
) -> Vec<&'a Complaint> {
    if query.limit == 0 {
        return Vec::new();
    }
    nearby_indices(target, all, query)
        .into_iter()
        .map(|i| &all[i])
        .collect()
}

/// Same as [`nearby_with`] but yields slot indices into `all`.
pub fn nearby_indices(target: &Complaint, all: &[Complaint], query: NearbyQuery) -> Vec<usize> {
    let origin = target.coordinates;
    let is_near = |c: &Complaint| {
        !std::ptr::eq(c, target) && degree_distance(c.coordinates, origin) < query.threshold
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let mut hits: Vec<usize> = all
            .par_iter()
            .enumerate()
            .filter(|(_, c)| is_near(c))
            .map(|(i, _)| i)
            .collect();
        hits.truncate(query.limit);
        hits
    }

    #[cfg(not(feature = "parallel"))]
    {
        all.iter()
            .enumerate()
            .filter(|(_, c)| is_near(c))
            .map(|(i, _)| i)
            .take(query.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::sample;

    #[test]
    fn worked_example_finds_close_neighbor() {
        let all = vec![
            sample("Illegal Dumping", 37.43, -122.17),
            sample("Air Quality", 37.4301, -122.1701),
        ];
        let d = degree_distance(all[0].coordinates, all[1].coordinates);
        assert!((d - 0.000141).abs() < 1e-5);

        let hits = nearby(&all[0], &all, DEFAULT_NEARBY_LIMIT);
        assert_eq!(hits.len(), 1);
        assert!(std::ptr::eq(hits[0], &all[1]));
    }

    #[test]
    fn excludes_self_and_far_points() {
        let all = vec![
            sample("Air Quality", 0.0, 0.0),
            sample("Air Quality", 0.0, 0.004),
            sample("Air Quality", 0.0, 0.0051),
            sample("Air Quality", 0.01, 0.0),
        ];
        let hits = nearby_indices(&all[0], &all, NearbyQuery::default());
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn threshold_is_strict() {
        let all = vec![
            sample("Air Quality", 0.0, 0.0),
            sample("Air Quality", 0.0, 0.005),
            sample("Air Quality", 0.005, 0.0),
            sample("Air Quality", 0.0, 0.00499),
        ];
        assert_eq!(degree_distance(all[0].coordinates, all[1].coordinates), 0.005);
        let hits = nearby_indices(&all[0], &all, NearbyQuery::default());
        assert_eq!(hits, vec![3]);
    }

    #[test]
    fn identity_exclusion_keeps_value_equal_duplicate() {
        let c = sample("Commercial Blight", 10.0, 10.0);
        let all = vec![c.clone(), c];
        let hits = nearby_indices(&all[0], &all, NearbyQuery::default());
        assert_eq!(hits, vec![1]);

        // a detached copy is not part of `all`, so nothing is excluded
        let detached = all[0].clone();
        assert_eq!(nearby(&detached, &all, 5).len(), 2);
    }

    #[test]
    fn truncates_to_limit_in_input_order() {
        let mut all = vec![sample("Air Quality", 5.0, 5.0)];
        for i in 1..=8 {
            all.push(sample("Air Quality", 5.0, 5.0 + i as f64 * 0.0001));
        }
        let hits = nearby_indices(&all[0], &all, NearbyQuery::default());
        assert_eq!(hits, vec![1, 2, 3, 4, 5]);
        assert!(nearby(&all[0], &all, 0).is_empty());
        assert_eq!(nearby(&all[0], &all, 100).len(), 8);
    }

    #[test]
    fn empty_collection_is_a_no_op() {
        let lone = sample("Other", 1.0, 1.0);
        assert!(nearby(&lone, &[], DEFAULT_NEARBY_LIMIT).is_empty());
    }
}
