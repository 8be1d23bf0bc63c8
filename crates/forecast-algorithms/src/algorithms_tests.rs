#[cfg(test)]
mod tests {
    use crate::*;
    use forecast_core::{AlgorithmParams, ForecastError};
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "length mismatch: {:?}", actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "expected {:?}, got {:?}", expected, actual);
        }
    }

    #[test]
    fn test_sma_recursive_steps() {
        let data = vec![100.0, 110.0, 120.0, 130.0, 140.0];
        let result = simple_moving_average(&data, 3, 2).unwrap();

        // step 1 = mean(120, 130, 140); step 2 = mean(130, 140, 130)
        assert_close(&result, &[130.0, 400.0 / 3.0]);
    }

    #[test]
    fn test_sma_converges_towards_window_mean() {
        let data = vec![0.0, 0.0, 10.0, 20.0];
        let result = simple_moving_average(&data, 2, 30).unwrap();
        let last = *result.last().unwrap();
        // mean of the last two real values lies between them
        assert!(last > 10.0 && last < 20.0);
        assert!((result[29] - result[28]).abs() < 1e-6);
    }

    #[test]
    fn test_sma_window_errors() {
        assert!(matches!(
            simple_moving_average(&[1.0, 2.0], 0, 1),
            Err(ForecastError::InvalidConfig(_))
        ));
        assert_eq!(
            simple_moving_average(&[1.0, 2.0], 3, 1),
            Err(ForecastError::InsufficientData { required: 3, actual: 2 })
        );
        assert!(matches!(
            simple_moving_average(&[], 1, 1),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_ewma_level() {
        let data = vec![1.0, 2.0, 3.0];
        let result = exponential_weighted_moving_average(&data, 0.5, 3).unwrap();
        // 1 -> 1.5 -> 2.25
        assert_close(&result, &[2.25, 2.25, 2.25]);
    }

    #[test]
    fn test_ewma_single_value() {
        let result = exponential_weighted_moving_average(&[42.0], 0.3, 2).unwrap();
        assert_close(&result, &[42.0, 42.0]);
    }

    #[test]
    fn test_ewma_errors() {
        assert!(matches!(
            exponential_weighted_moving_average(&[1.0], 1.0, 1),
            Err(ForecastError::InvalidConfig(_))
        ));
        assert!(matches!(
            exponential_weighted_moving_average(&[], 0.5, 1),
            Err(ForecastError::InsufficientData { required: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let data = vec![10.0, 12.0, 14.0, 16.0];
        let fit = fit_line(&data).unwrap();
        assert!((fit.slope - 2.0).abs() < EPS);
        assert!((fit.intercept - 10.0).abs() < EPS);

        let result = linear_regression_forecast(&data, 3).unwrap();
        assert_close(&result, &[18.0, 20.0, 22.0]);
    }

    #[test]
    fn test_linear_regression_flat_series() {
        let result = linear_regression_forecast(&[5.0, 5.0, 5.0], 2).unwrap();
        assert_close(&result, &[5.0, 5.0]);
    }

    #[test]
    fn test_linear_regression_needs_two_points() {
        assert_eq!(
            linear_regression_forecast(&[1.0], 1),
            Err(ForecastError::InsufficientData { required: 2, actual: 1 })
        );
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(matches!(
            linear_regression_forecast(&[1.0, 2.0], 0),
            Err(ForecastError::InvalidConfig(_))
        ));
        assert!(matches!(
            forecast(&[1.0, 2.0], 0, &AlgorithmParams::Ewma { alpha: 0.5 }),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_centered_moving_average_even_period() {
        let data = vec![10.0, 20.0, 30.0, 40.0, 10.0, 20.0];
        let (offset, trend) = centered_moving_average(&data, 4);
        assert_eq!(offset, 2);
        assert_eq!(trend.len(), 2);
        // a full periodic window averages to the pattern mean
        assert!((trend[0] - 25.0).abs() < EPS);
        assert!((trend[1] - 25.0).abs() < EPS);
    }

    #[test]
    fn test_seasonal_reproduces_periodic_pattern() {
        let pattern = [10.0, 20.0, 30.0, 40.0];
        let data: Vec<f64> = pattern.iter().cycle().take(12).copied().collect();

        let result = seasonal_decomposition(&data, 4, 8).unwrap();
        let expected: Vec<f64> = pattern.iter().cycle().take(8).copied().collect();
        assert_close(&result, &expected);
    }

    #[test]
    fn test_seasonal_odd_period_with_trend() {
        let pattern = [-5.0, 0.0, 5.0];
        let data: Vec<f64> = (0..15)
            .map(|i| 100.0 + 2.0 * i as f64 + pattern[i % 3])
            .collect();

        let result = seasonal_decomposition(&data, 3, 3).unwrap();
        let expected: Vec<f64> = (15..18)
            .map(|i| 100.0 + 2.0 * i as f64 + pattern[i % 3])
            .collect();
        assert_close(&result, &expected);
    }

    #[test]
    fn test_seasonal_index_is_mean_zero() {
        let data: Vec<f64> = [3.0, 9.0, 1.0, 7.0].iter().cycle().take(16).copied().collect();
        let decomposition = decompose(&data, 4).unwrap();
        let sum: f64 = decomposition.seasonal_index.iter().sum();
        assert!(sum.abs() < EPS);
    }

    #[test]
    fn test_seasonal_requires_two_cycles() {
        let data = vec![1.0; 7];
        assert_eq!(
            seasonal_decomposition(&data, 4, 1),
            Err(ForecastError::InsufficientData { required: 8, actual: 7 })
        );
        assert!(matches!(
            seasonal_decomposition(&data, 0, 1),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dispatch_matches_direct_calls() {
        let data = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        assert_eq!(
            forecast(&data, 2, &AlgorithmParams::Sma { window: 3 }).unwrap(),
            simple_moving_average(&data, 3, 2).unwrap()
        );
        assert_eq!(
            forecast(&data, 2, &AlgorithmParams::LinearRegression).unwrap(),
            linear_regression_forecast(&data, 2).unwrap()
        );
        assert_eq!(
            forecast(&data, 2, &AlgorithmParams::Seasonal { season_length: 2 }).unwrap(),
            seasonal_decomposition(&data, 2, 2).unwrap()
        );
    }

    #[test]
    fn test_dispatch_rejects_non_finite_input() {
        let data = vec![1.0, f64::NAN, 3.0];
        assert!(matches!(
            forecast(&data, 1, &AlgorithmParams::LinearRegression),
            Err(ForecastError::Computation(_))
        ));
    }

    #[test]
    fn test_overflow_reported_as_computation_error() {
        let data = vec![f64::MAX, f64::MAX];
        assert!(matches!(
            simple_moving_average(&data, 2, 1),
            Err(ForecastError::Computation(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_sma_constant_series(c in -1.0e6f64..1.0e6, len in 1usize..40, window in 1usize..40, horizon in 1usize..20) {
            prop_assume!(window <= len);
            let data = vec![c; len];
            let result = simple_moving_average(&data, window, horizon).unwrap();
            prop_assert_eq!(result.len(), horizon);
            for v in result {
                prop_assert!((v - c).abs() <= 1e-9 * c.abs().max(1.0));
            }
        }

        #[test]
        fn prop_linear_regression_exact_line(m in -100.0f64..100.0, b in -1000.0f64..1000.0, n in 2usize..50, h in 1usize..10) {
            let data: Vec<f64> = (0..n).map(|i| m * i as f64 + b).collect();
            let result = linear_regression_forecast(&data, h).unwrap();
            for (step, v) in result.iter().enumerate() {
                let expected = m * (n - 1 + step + 1) as f64 + b;
                prop_assert!((v - expected).abs() < 1e-6, "step {}: {} vs {}", step, v, expected);
            }
        }

        #[test]
        fn prop_ewma_is_flat(data in proptest::collection::vec(-1.0e4f64..1.0e4, 1..50), alpha in 0.01f64..0.99, h in 1usize..15) {
            let result = exponential_weighted_moving_average(&data, alpha, h).unwrap();
            prop_assert_eq!(result.len(), h);
            prop_assert!(result.iter().all(|v| *v == result[0]));
        }
    }
}
