/// Bucket width: every 100 outbound links costs one point.
pub const BUCKET_WIDTH: u64 = 100;
pub const MAX_SCORE: u8 = 10;
pub const MIN_SCORE: u8 = 1;

/// Outlink-count quality heuristic in `[1, 10]`.
///
/// Domains that link out a lot (directories, link farms) score low.
pub fn authority_score(outlink_count: u64) -> u8 {
    let penalty = outlink_count / BUCKET_WIDTH;
    let score = (MAX_SCORE as u64).saturating_sub(penalty);
    score.clamp(MIN_SCORE as u64, MAX_SCORE as u64) as u8
}

/// `[#######---]` style bar for text reports.
pub fn authority_bar(score: u8) -> String {
    let filled = score.clamp(MIN_SCORE, MAX_SCORE) as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(MAX_SCORE as usize - filled)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_bucket_edges() {
        assert_eq!(authority_score(0), 10);
        assert_eq!(authority_score(99), 10);
        assert_eq!(authority_score(100), 9);
        assert_eq!(authority_score(999), 1);
        assert_eq!(authority_score(1000), 1);
        assert_eq!(authority_score(u64::MAX), 1);
    }

    #[test]
    fn test_authority_is_bounded_and_non_increasing() {
        let mut previous = authority_score(0);
        for count in (0..5_000).step_by(7) {
            let score = authority_score(count);
            assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_authority_bar() {
        assert_eq!(authority_bar(10), "[##########]");
        assert_eq!(authority_bar(3), "[###-------]");
        assert_eq!(authority_bar(0), "[#---------]");
    }
}
