use super::*;

fn sample(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn explicit_values_win_over_derivation() {
    let s = sample(&[("PM10", 80.0), ("TSP", 300.0)]);
    let row = resolve(&names(&["PM10"]), &s);
    assert_eq!(row, vec![80.0]);
}

#[test]
fn pm10_falls_back_to_scaled_tsp() {
    let s = sample(&[("TSP", 90.0)]);
    let row = resolve(&names(&["PM10"]), &s);
    assert_eq!(row, vec![60.0]);
}

#[test]
fn pm_ratio_uses_resolved_pm10() {
    let s = sample(&[("PM2.5", 30.0), ("TSP", 90.0)]);
    let row = resolve(&names(&["PM_ratio"]), &s);
    let expected = 30.0 / (60.0 + PM_RATIO_EPSILON);
    assert!((row[0] - expected).abs() < 1e-12);
}

#[test]
fn pm_ratio_is_zero_without_particulates() {
    let s = sample(&[("O3", 40.0)]);
    let row = resolve(&names(&["PM_ratio"]), &s);
    assert_eq!(row, vec![0.0]);
}

#[test]
fn temp_humid_index_is_derived() {
    let s = sample(&[("Temperature", 30.0), ("Humidity", 70.0)]);
    let row = resolve(&names(&["Temp_Humid_Idx"]), &s);
    assert_eq!(row, vec![21.0]);
}

#[test]
fn rush_hour_follows_the_hour_field() {
    let s = sample(&[("Hour", 8.0)]);
    assert_eq!(resolve(&names(&["Is_Rush_Hour"]), &s), vec![1.0]);

    let s = sample(&[("Hour", 13.0)]);
    assert_eq!(resolve(&names(&["Is_Rush_Hour"]), &s), vec![0.0]);

    let s = sample(&[]);
    assert_eq!(resolve(&names(&["Is_Rush_Hour"]), &s), vec![0.0]);
}

#[test]
fn missing_features_default_to_zero() {
    let s = sample(&[("PM2.5", 12.0)]);
    let row = resolve(&names(&["PM2.5", "O3", "CO"]), &s);
    assert_eq!(row, vec![12.0, 0.0, 0.0]);
}

#[test]
fn layout_hash_is_stable() {
    assert_eq!(layout_hash(), layout_hash());
    assert_ne!(layout_hash(), 0);
}

#[test]
fn layout_knows_its_columns() {
    assert!(layout::is_known("PM2.5"));
    assert!(layout::is_known("PM2.5_mean3h"));
    assert!(!layout::is_known("WindSpeed"));
}
