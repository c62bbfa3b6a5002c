//! Exact one-sided binomial test with a fixed multiplicity correction.

use statrs::distribution::{Binomial, DiscreteCDF};

use crate::domain::error::DomainError;

/// Multiplicity correction applied to every raw p-value.
///
/// Fixed by configuration, never derived from the number of tested nodes.
pub const DEFAULT_CORRECTION_FACTOR: f64 = 150.0;

/// Significance level compared against corrected p-values.
pub const DEFAULT_P_THRESHOLD: f64 = 0.05;

/// Result of testing one `(q, n, p)` triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub p_value: f64,
    pub corrected_p_value: f64,
    pub is_significant: bool,
}

/// Upper tail `P(X >= q)` for `X ~ Binomial(n, p)`.
///
/// `n = 0` gives 1: zero trials carry no evidence.
pub fn upper_tail(q: u64, n: u64, p: f64) -> Result<f64, DomainError> {
    if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
        return Err(DomainError::ProbabilityOutOfRange(p));
    }
    if q > n {
        return Err(DomainError::CountExceedsSampleSize { q, n });
    }
    if n == 0 || q == 0 {
        return Ok(1.0);
    }
    let dist = Binomial::new(p, n).map_err(|_| DomainError::ProbabilityOutOfRange(p))?;
    // sf(k) is P(X > k), so shift by one to include q itself
    Ok(dist.sf(q - 1).clamp(0.0, 1.0))
}

/// Binomial tester with a fixed correction factor and significance level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinomialTester {
    correction_factor: f64,
    p_threshold: f64,
}

impl Default for BinomialTester {
    fn default() -> Self {
        Self::new(DEFAULT_CORRECTION_FACTOR, DEFAULT_P_THRESHOLD)
    }
}

impl BinomialTester {
    pub fn new(correction_factor: f64, p_threshold: f64) -> Self {
        Self {
            correction_factor,
            p_threshold,
        }
    }

    pub fn correction_factor(&self) -> f64 {
        self.correction_factor
    }

    pub fn p_threshold(&self) -> f64 {
        self.p_threshold
    }

    pub fn test(&self, q: u64, n: u64, p: f64) -> Result<TestOutcome, DomainError> {
        let p_value = upper_tail(q, n, p)?;
        Ok(self.correct(p_value))
    }

    /// Apply the correction to a raw p-value; equality with the threshold is
    /// not significant.
    pub fn correct(&self, p_value: f64) -> TestOutcome {
        let corrected_p_value = p_value * self.correction_factor;
        TestOutcome {
            p_value,
            corrected_p_value,
            is_significant: corrected_p_value < self.p_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn binomial_coefficient(n: u64, k: u64) -> f64 {
        (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
    }

    fn naive_upper_tail(q: u64, n: u64, p: f64) -> f64 {
        (q..=n)
            .map(|k| binomial_coefficient(n, k) * p.powi(k as i32) * (1.0 - p).powi((n - k) as i32))
            .sum()
    }

    #[rstest]
    #[case(1, 1, 0.5, 0.5)]
    #[case(2, 2, 0.5, 0.25)]
    #[case(2, 3, 0.5, 0.5)]
    #[case(1, 3, 0.5, 0.875)]
    #[case(0, 10, 0.3, 1.0)]
    #[case(3, 3, 0.1, 0.001)]
    fn test_upper_tail_closed_forms(#[case] q: u64, #[case] n: u64, #[case] p: f64, #[case] expected: f64) {
        let got = upper_tail(q, n, p).unwrap();
        assert!((got - expected).abs() < 1e-9, "q={q} n={n} p={p}: {got} != {expected}");
    }

    #[rstest]
    #[case(0.05)]
    #[case(0.25)]
    #[case(0.5)]
    #[case(0.9)]
    fn test_upper_tail_matches_summed_pmf(#[case] p: f64) {
        let n = 30;
        for q in 0..=n {
            let got = upper_tail(q, n, p).unwrap();
            let expected = naive_upper_tail(q, n, p);
            assert!((got - expected).abs() < 1e-9, "q={q} p={p}: {got} != {expected}");
        }
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.3)]
    #[case(1.0)]
    fn test_zero_trials_is_never_significant(#[case] p: f64) {
        let tester = BinomialTester::default();
        let outcome = tester.test(0, 0, p).unwrap();
        assert_eq!(outcome.p_value, 1.0);
        assert!(!outcome.is_significant);
    }

    #[test]
    fn test_degenerate_probabilities() {
        assert_eq!(upper_tail(1, 5, 0.0).unwrap(), 0.0);
        assert_eq!(upper_tail(5, 5, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(
            upper_tail(4, 3, 0.5),
            Err(DomainError::CountExceedsSampleSize { q: 4, n: 3 })
        );
        assert!(matches!(upper_tail(1, 3, 1.5), Err(DomainError::ProbabilityOutOfRange(_))));
        assert!(matches!(upper_tail(1, 3, -0.1), Err(DomainError::ProbabilityOutOfRange(_))));
        assert!(matches!(upper_tail(1, 3, f64::NAN), Err(DomainError::ProbabilityOutOfRange(_))));
    }

    #[test]
    fn test_correction_boundary_is_not_significant() {
        let tester = BinomialTester::new(100.0, 0.05);
        let at_boundary = tester.correct(0.0005);
        assert!((at_boundary.corrected_p_value - 0.05).abs() < 1e-15);
        let below = tester.correct(0.0004);
        assert!(below.is_significant);
        let above = tester.correct(0.0006);
        assert!(!above.is_significant);

        let exact = BinomialTester::new(1.0, 0.5).correct(0.5);
        assert!(!exact.is_significant);
    }

    #[test]
    fn test_correction_is_monotonic() {
        let tester = BinomialTester::default();
        let values = [1e-9, 1e-6, 1e-4, 3e-4, 1e-2, 0.5, 1.0];
        let corrected: Vec<f64> = values.iter().map(|&v| tester.correct(v).corrected_p_value).collect();
        assert!(corrected.windows(2).all(|w| w[0] <= w[1]));
        let flags: Vec<bool> = values.iter().map(|&v| tester.correct(v).is_significant).collect();
        assert_eq!(flags, vec![true, true, true, true, false, false, false]);
    }
}
