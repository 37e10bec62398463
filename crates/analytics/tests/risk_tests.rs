use approx::assert_relative_eq;
use folio_analytics::risk::{
    correlation, correlation_matrix, pearson, population_std, sharpe_ratio, volatility,
};

fn ramp(len: u32) -> Vec<f64> {
    (0..len).map(|i| 0.001 * f64::from(i % 7) - 0.002).collect()
}

#[test]
fn test_volatility_is_population_std() {
    assert_relative_eq!(population_std(&[1.0, 2.0, 3.0, 4.0]), 1.25_f64.sqrt());
    assert_relative_eq!(volatility(&[0.01, -0.01, 0.01, -0.01]), 0.01, epsilon = 1e-15);
    assert_eq!(volatility(&[]), 0.0);
    assert!(volatility(&[0.03; 10]) < 1e-15);
}

#[test]
fn test_pearson_known_values() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0];
    let doubled = [2.0, 4.0, 6.0, 8.0, 10.0];
    let reversed = [5.0, 4.0, 3.0, 2.0, 1.0];
    assert_relative_eq!(pearson(&a, &doubled), 1.0, epsilon = 1e-12);
    assert_relative_eq!(pearson(&a, &reversed), -1.0, epsilon = 1e-12);
    assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[1.0, 3.0, 2.0]), 0.5, epsilon = 1e-12);
    // 常数序列方差为 0
    assert_eq!(pearson(&a, &[3.0; 5]), 0.0);
}

#[test]
fn test_correlation_requires_min_points() {
    let a = ramp(30);
    let b: Vec<f64> = a.iter().map(|v| 2.0 * v + 0.001).collect();

    assert_eq!(correlation(&a[..29], &b[..29], 30), 0.0);
    assert_relative_eq!(correlation(&a, &b, 30), 1.0, epsilon = 1e-12);
}

#[test]
fn test_correlation_trims_to_overlapping_tail() {
    let tail = ramp(35);
    // 较长序列前面多出 5 个与对方无关的样本
    let mut longer = vec![0.5, -0.5, 0.4, -0.4, 0.3];
    longer.extend(tail.iter().map(|v| -v));

    assert_relative_eq!(correlation(&longer, &tail, 30), -1.0, epsilon = 1e-12);
    assert_relative_eq!(correlation(&tail, &longer, 30), -1.0, epsilon = 1e-12);
    assert!(pearson(&longer, &tail) > -0.99);
}

#[test]
fn test_correlation_matrix_diagonal() {
    let series = vec![ramp(40), ramp(40).iter().map(|v| v * 3.0).collect::<Vec<f64>>(), vec![0.01; 10]];
    let m = correlation_matrix(&series, 30);
    for (i, row) in m.iter().enumerate() {
        assert_eq!(row[i], 1.0);
    }
    assert_relative_eq!(m[0][1], 1.0, epsilon = 1e-12);
    assert_eq!(m[0][1], m[1][0]);
    // 样本不足的配对记 0
    assert_eq!(m[0][2], 0.0);
    assert_eq!(m[2][1], 0.0);
}

#[test]
fn test_sharpe_ratio() {
    assert_eq!(sharpe_ratio(&[0.01; 20], 0.0), 0.0);
    assert_eq!(sharpe_ratio(&[], 0.0), 0.0);
    // 均值 0.01，总体标准差 0.01
    assert_relative_eq!(sharpe_ratio(&[0.02, 0.0], 0.0), 1.0, epsilon = 1e-12);
    assert_relative_eq!(sharpe_ratio(&[0.02, 0.0], 0.005), 0.5, epsilon = 1e-12);
}
