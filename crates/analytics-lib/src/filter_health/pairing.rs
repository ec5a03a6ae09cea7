//! Pre/post reading pairing
//!
//! Filter efficiency can only be measured across the medium, so readings
//! from the pre-filtration and post-filtration sensors must be lined up in
//! time before any comparison is meaningful.

use crate::models::Reading;

/// A pre-filtration reading matched with its post-filtration counterpart
#[derive(Debug, Clone)]
pub struct ReadingPair {
    pub pre: Reading,
    pub post: Reading,
}

/// Match pre and post readings by timestamp proximity
///
/// For each pre reading the first post reading within `window_secs` wins;
/// unmatched readings on either side are dropped.
pub fn match_readings(pre: &[Reading], post: &[Reading], window_secs: i64) -> Vec<ReadingPair> {
    let mut pairs = Vec::new();

    for pre_reading in pre {
        let matched = post.iter().find(|post_reading| {
            (pre_reading.timestamp - post_reading.timestamp)
                .num_seconds()
                .abs()
                <= window_secs
        });

        if let Some(post_reading) = matched {
            pairs.push(ReadingPair {
                pre: pre_reading.clone(),
                post: post_reading.clone(),
            });
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterMode;
    use chrono::{Duration, Utc};

    fn reading_at(device_id: &str, offset_secs: i64) -> Reading {
        Reading {
            device_id: device_id.to_string(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            mode: FilterMode::Drinking,
            flow: 5.0,
            ph: 7.0,
            turbidity: 10.0,
            tds: 250.0,
        }
    }

    #[test]
    fn test_pairs_within_window() {
        let pre: Vec<Reading> = (0..5).map(|i| reading_at("filter_pre", i * 3600)).collect();
        let post: Vec<Reading> = (0..5)
            .map(|i| reading_at("filter_post", i * 3600 + 20))
            .collect();

        let pairs = match_readings(&pre, &post, 60);
        assert_eq!(pairs.len(), 5);
    }

    #[test]
    fn test_unmatched_readings_dropped() {
        let pre: Vec<Reading> = (0..5).map(|i| reading_at("filter_pre", i * 3600)).collect();
        // Post readings offset by 10 minutes never fall within the window
        let post: Vec<Reading> = (0..5)
            .map(|i| reading_at("filter_post", i * 3600 + 600))
            .collect();

        let pairs = match_readings(&pre, &post, 60);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_first_match_wins() {
        let pre = vec![reading_at("filter_pre", 0)];
        let post = vec![
            reading_at("filter_post", 30),
            reading_at("filter_post", 10),
        ];

        let pairs = match_readings(&pre, &post, 60);
        assert_eq!(pairs.len(), 1);
        // The earlier element of the post slice wins even though the
        // second is closer in time
        assert_eq!(
            pairs[0].post.timestamp,
            post[0].timestamp,
        );
    }
}
