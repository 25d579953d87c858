use super::*;
use std::str::FromStr;

const HOURLY_CSV: &str = "\
date,Station_No,PM2.5,PM10,O3,CO,NO2,SO2,Temperature,Humidity
2024-01-01 07:00:00,S1,10,20,30,0.4,12,5,25,70
2024-01-01 08:00:00,S1,,22,31,0.5,13,6,26,71
2024-01-01 09:00:00,S1,30,24,32,0.6,14,7,27,72
";

fn hourly() -> DataSet {
    DataSet::from_reader(HOURLY_CSV.as_bytes()).unwrap()
}

fn feature_index(prepared: &PreparedData, name: &str) -> usize {
    prepared
        .feature_names
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("missing feature {}", name))
}

// ============================================================================
// Parsing and summary
// ============================================================================

#[test]
fn load_parses_numeric_and_blank_cells() {
    let ds = hourly();
    assert_eq!(ds.n_rows, 3);
    assert!(!ds.columns.contains(&"date".to_string()));
    assert!(!ds.columns.contains(&STATION_COLUMN.to_string()));

    let pm25 = ds.column("PM2.5").unwrap();
    assert_eq!(pm25[0], Some(10.0));
    assert_eq!(pm25[1], None);
    assert_eq!(pm25[2], Some(30.0));

    let stations = ds.stations.as_ref().unwrap();
    assert_eq!(stations[0], "S1");
    assert!(ds.timestamps.as_ref().unwrap()[0].is_some());
}

#[test]
fn load_rejects_files_without_pollutants() {
    let csv = "date,Temperature\n2024-01-01,20\n";
    assert!(DataSet::from_reader(csv.as_bytes()).is_err());
}

#[test]
fn summary_reports_shape_stations_and_range() {
    let summary = hourly().summary();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.stations, vec!["S1"]);
    let (first, last) = summary.date_range.unwrap();
    assert_eq!(first, "2024-01-01 07:00:00");
    assert_eq!(last, "2024-01-01 09:00:00");

    let pm25 = summary.pm25.unwrap();
    assert_eq!(pm25.min, 10.0);
    assert_eq!(pm25.max, 30.0);
    assert_eq!(pm25.mean, 20.0);
}

#[test]
fn median_of_odd_even_and_empty() {
    assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
    assert_eq!(median(vec![1.0, 2.0, 3.0, 4.0]), 2.5);
    assert_eq!(median(vec![]), 0.0);
}

// ============================================================================
// Preparation
// ============================================================================

#[test]
fn prepare_imputes_with_the_column_median() {
    let prepared = hourly().prepare(PrepConfig { horizon_hours: 0 }).unwrap();
    let j = feature_index(&prepared, "PM2.5");
    // Median of 10 and 30 fills the blank second row.
    assert_eq!(prepared.x[[1, j]], 20.0);
}

#[test]
fn prepare_builds_the_canonical_feature_order() {
    let prepared = hourly().prepare(PrepConfig { horizon_hours: 0 }).unwrap();
    assert_eq!(
        prepared.feature_names,
        vec![
            "PM2.5",
            "PM10",
            "O3",
            "CO",
            "NO2",
            "SO2",
            "Temperature",
            "Humidity",
            "PM_ratio",
            "Temp_Humid_Idx",
            "Hour",
            "Is_Rush_Hour",
        ]
    );
    assert_eq!(prepared.x.nrows(), 3);
}

#[test]
fn prepare_labels_rows_via_the_aqi_transform() {
    let prepared = hourly().prepare(PrepConfig { horizon_hours: 0 }).unwrap();
    assert_eq!(prepared.labels, vec!["Good", "Moderate", "Moderate"]);
}

#[test]
fn prepare_adds_time_features_when_dated() {
    let prepared = hourly().prepare(PrepConfig { horizon_hours: 0 }).unwrap();
    let hour = feature_index(&prepared, "Hour");
    let rush = feature_index(&prepared, "Is_Rush_Hour");
    assert_eq!(prepared.x[[0, hour]], 7.0);
    assert_eq!(prepared.x[[2, hour]], 9.0);
    assert_eq!(prepared.x[[0, rush]], 1.0);
    assert_eq!(prepared.x[[2, rush]], 0.0);
}

#[test]
fn prepare_derives_pm10_from_tsp() {
    let csv = "\
Station_No,TSP,Temperature,Humidity
S1,90,25,70
S1,60,26,71
";
    let ds = DataSet::from_reader(csv.as_bytes()).unwrap();
    let prepared = ds.prepare(PrepConfig { horizon_hours: 0 }).unwrap();
    assert_eq!(
        prepared.feature_names,
        vec!["PM10", "Temperature", "Humidity", "Temp_Humid_Idx"]
    );
    assert_eq!(prepared.x[[0, 0]], 60.0);
    assert_eq!(prepared.x[[1, 0]], 40.0);
}

#[test]
fn prepare_horizon_builds_lags_and_shifted_target() {
    let mut csv = String::from("date,Station_No,PM2.5\n");
    for hour in 0..10 {
        let pm25 = if hour == 9 { 300.0 } else { 5.0 };
        csv.push_str(&format!("2024-01-01 {:02}:00:00,S1,{}\n", hour, pm25));
    }
    let ds = DataSet::from_reader(csv.as_bytes()).unwrap();
    let prepared = ds.prepare(PrepConfig { horizon_hours: 1 }).unwrap();

    assert_eq!(
        prepared.feature_names,
        vec!["PM2.5", "Hour", "Is_Rush_Hour", "PM2.5_lag1h", "PM2.5_mean3h"]
    );
    // Rows 0 and 1 lack a full lag window, row 9 lacks a target.
    assert_eq!(prepared.x.nrows(), 7);

    let lag = feature_index(&prepared, "PM2.5_lag1h");
    let mean = feature_index(&prepared, "PM2.5_mean3h");
    assert_eq!(prepared.x[[0, lag]], 5.0);
    assert_eq!(prepared.x[[0, mean]], 5.0);

    // The last kept row predicts the hazardous hour 9.
    assert_eq!(prepared.labels[6], "Hazardous");
    assert!(prepared.labels[..6].iter().all(|l| l == "Good"));
}

#[test]
fn prepare_horizon_keeps_stations_apart() {
    let mut csv = String::from("date,Station_No,PM2.5\n");
    for hour in 0..5 {
        csv.push_str(&format!("2024-01-01 {:02}:00:00,S1,10\n", hour));
    }
    for hour in 0..5 {
        csv.push_str(&format!("2024-01-01 {:02}:00:00,S2,80\n", hour));
    }
    let ds = DataSet::from_reader(csv.as_bytes()).unwrap();
    let prepared = ds.prepare(PrepConfig { horizon_hours: 1 }).unwrap();

    // Each station keeps k = 2 and k = 3.
    assert_eq!(prepared.x.nrows(), 4);
    let lag = feature_index(&prepared, "PM2.5_lag1h");
    assert_eq!(prepared.x[[0, lag]], 10.0);
    assert_eq!(prepared.x[[2, lag]], 80.0);
}

#[test]
fn prepare_horizon_requires_station_and_date() {
    let csv = "date,PM2.5\n2024-01-01 00:00:00,5\n";
    let ds = DataSet::from_reader(csv.as_bytes()).unwrap();
    let err = ds.prepare(PrepConfig { horizon_hours: 1 }).unwrap_err();
    assert!(err.to_string().contains(STATION_COLUMN));
}

#[test]
fn prepare_horizon_needs_enough_history() {
    let csv = "\
date,Station_No,PM2.5
2024-01-01 00:00:00,S1,5
2024-01-01 01:00:00,S1,5
2024-01-01 02:00:00,S1,5
";
    let ds = DataSet::from_reader(csv.as_bytes()).unwrap();
    assert!(ds.prepare(PrepConfig { horizon_hours: 1 }).is_err());
}

// ============================================================================
// Splits
// ============================================================================

fn split_fixture() -> (ndarray::Array2<f64>, Vec<usize>) {
    let n = 40;
    let x = ndarray::Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
    let y: Vec<usize> = (0..n).map(|i| usize::from(i >= 30)).collect();
    (x, y)
}

#[test]
fn split_is_stratified() {
    let (x, y) = split_fixture();
    let split = train_test_split(&x, &y, 0.2, 42).unwrap();

    assert_eq!(split.y_test.len(), 8);
    assert_eq!(split.y_test.iter().filter(|&&c| c == 0).count(), 6);
    assert_eq!(split.y_test.iter().filter(|&&c| c == 1).count(), 2);
    assert_eq!(split.y_train.len(), 32);
    assert_eq!(split.x_train.nrows(), 32);
}

#[test]
fn split_is_deterministic_for_a_seed() {
    let (x, y) = split_fixture();
    let a = train_test_split(&x, &y, 0.2, 7).unwrap();
    let b = train_test_split(&x, &y, 0.2, 7).unwrap();
    assert_eq!(a.y_test, b.y_test);
    assert_eq!(a.x_test, b.x_test);
}

#[test]
fn split_keeps_singleton_classes_in_training() {
    let x = ndarray::Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
    let mut y = vec![0usize; 10];
    y[9] = 1;
    let split = train_test_split(&x, &y, 0.3, 1).unwrap();
    assert!(split.y_train.contains(&1));
    assert!(!split.y_test.contains(&1));
}

#[test]
fn split_rejects_bad_test_size() {
    let (x, y) = split_fixture();
    assert!(train_test_split(&x, &y, 0.0, 1).is_err());
    assert!(train_test_split(&x, &y, 1.0, 1).is_err());
}

#[test]
fn time_ordered_split_cuts_the_tail() {
    let x = ndarray::Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
    let y = vec![0usize; 10];
    let split = time_ordered_split(&x, &y, 0.2).unwrap();
    assert_eq!(split.x_train.nrows(), 8);
    assert_eq!(split.x_test[[0, 0]], 8.0);
    assert_eq!(split.x_test[[1, 0]], 9.0);
}

// ============================================================================
// Rebalancing
// ============================================================================

#[test]
fn rebalance_none_is_identity() {
    let (x, y) = split_fixture();
    let (bx, by) = rebalance(&x, &y, BalanceStrategy::None, 1).unwrap();
    assert_eq!(bx, x);
    assert_eq!(by, y);
}

#[test]
fn oversample_equalizes_counts_with_real_rows() {
    let x = ndarray::Array2::from_shape_fn((8, 1), |(i, _)| {
        if i < 6 {
            i as f64
        } else {
            100.0 * (i - 5) as f64
        }
    });
    let y = vec![0, 0, 0, 0, 0, 0, 1, 1];
    let (bx, by) = rebalance(&x, &y, BalanceStrategy::Oversample, 42).unwrap();

    assert_eq!(by.len(), 12);
    assert_eq!(by.iter().filter(|&&c| c == 1).count(), 6);
    for (i, &class) in by.iter().enumerate() {
        if class == 1 {
            let v = bx[[i, 0]];
            assert!(v == 100.0 || v == 200.0, "duplicate must be a real row");
        }
    }
}

#[test]
fn smote_interpolates_between_neighbors() {
    let mut rows = vec![
        vec![10.0, 20.0],
        vec![11.0, 21.0],
        vec![12.0, 22.0],
        vec![13.0, 23.0],
        vec![14.0, 24.0],
        vec![15.0, 25.0],
    ];
    rows.push(vec![0.0, 0.0]);
    rows.push(vec![1.0, 1.0]);
    let x = ndarray::Array2::from_shape_vec((8, 2), rows.into_iter().flatten().collect()).unwrap();
    let y = vec![0, 0, 0, 0, 0, 0, 1, 1];

    let (bx, by) = rebalance(&x, &y, BalanceStrategy::Smote, 42).unwrap();
    assert_eq!(by.iter().filter(|&&c| c == 1).count(), 6);

    // Both minority points sit on the x = y diagonal, so every
    // interpolation does too.
    for i in 8..bx.nrows() {
        assert_eq!(by[i], 1);
        let (a, b) = (bx[[i, 0]], bx[[i, 1]]);
        assert!((a - b).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&a));
    }
}

#[test]
fn smote_duplicates_singleton_classes() {
    let x = ndarray::Array2::from_shape_vec(
        (4, 2),
        vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 9.0, 9.0],
    )
    .unwrap();
    let y = vec![0, 0, 0, 1];
    let (bx, by) = rebalance(&x, &y, BalanceStrategy::Smote, 1).unwrap();
    assert_eq!(by.iter().filter(|&&c| c == 1).count(), 3);
    for i in 4..bx.nrows() {
        assert_eq!(bx[[i, 0]], 9.0);
        assert_eq!(bx[[i, 1]], 9.0);
    }
}

#[test]
fn balance_strategy_parses_from_str() {
    assert_eq!(
        BalanceStrategy::from_str("smote").unwrap(),
        BalanceStrategy::Smote
    );
    assert_eq!(
        BalanceStrategy::from_str("OVERSAMPLE").unwrap(),
        BalanceStrategy::Oversample
    );
    assert!(BalanceStrategy::from_str("undersample").is_err());
}
