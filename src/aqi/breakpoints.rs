//! EPA breakpoint tables used by the AQI transform.
//!
//! Concentration units follow the EPA tables: PM2.5 / PM10 in ug/m3,
//! CO in ppm, O3 / NO2 / SO2 in ppb. The 8-hour ozone table stops at
//! index 300 because 8-hour ozone does not define higher AQI values.

/// One row of a breakpoint table: a concentration band and the index
/// band it maps onto.
#[derive(Debug, Clone, Copy)]
pub struct Breakpoint {
    pub conc_lo: f64,
    pub conc_hi: f64,
    pub index_lo: f64,
    pub index_hi: f64,
}

const fn bp(conc_lo: f64, conc_hi: f64, index_lo: f64, index_hi: f64) -> Breakpoint {
    Breakpoint {
        conc_lo,
        conc_hi,
        index_lo,
        index_hi,
    }
}

pub(crate) const PM25: &[Breakpoint] = &[
    bp(0.0, 12.0, 0.0, 50.0),
    bp(12.1, 35.4, 51.0, 100.0),
    bp(35.5, 55.4, 101.0, 150.0),
    bp(55.5, 150.4, 151.0, 200.0),
    bp(150.5, 250.4, 201.0, 300.0),
    bp(250.5, 350.4, 301.0, 400.0),
    bp(350.5, 500.4, 401.0, 500.0),
];

pub(crate) const PM10: &[Breakpoint] = &[
    bp(0.0, 54.0, 0.0, 50.0),
    bp(55.0, 154.0, 51.0, 100.0),
    bp(155.0, 254.0, 101.0, 150.0),
    bp(255.0, 354.0, 151.0, 200.0),
    bp(355.0, 424.0, 201.0, 300.0),
    bp(425.0, 504.0, 301.0, 400.0),
    bp(505.0, 604.0, 401.0, 500.0),
];

pub(crate) const O3: &[Breakpoint] = &[
    bp(0.0, 54.0, 0.0, 50.0),
    bp(55.0, 70.0, 51.0, 100.0),
    bp(71.0, 85.0, 101.0, 150.0),
    bp(86.0, 105.0, 151.0, 200.0),
    bp(106.0, 200.0, 201.0, 300.0),
];

pub(crate) const CO: &[Breakpoint] = &[
    bp(0.0, 4.4, 0.0, 50.0),
    bp(4.5, 9.4, 51.0, 100.0),
    bp(9.5, 12.4, 101.0, 150.0),
    bp(12.5, 15.4, 151.0, 200.0),
    bp(15.5, 30.4, 201.0, 300.0),
    bp(30.5, 40.4, 301.0, 400.0),
    bp(40.5, 50.4, 401.0, 500.0),
];

pub(crate) const NO2: &[Breakpoint] = &[
    bp(0.0, 53.0, 0.0, 50.0),
    bp(54.0, 100.0, 51.0, 100.0),
    bp(101.0, 360.0, 101.0, 150.0),
    bp(361.0, 649.0, 151.0, 200.0),
    bp(650.0, 1249.0, 201.0, 300.0),
    bp(1250.0, 1649.0, 301.0, 400.0),
    bp(1650.0, 2049.0, 401.0, 500.0),
];

pub(crate) const SO2: &[Breakpoint] = &[
    bp(0.0, 35.0, 0.0, 50.0),
    bp(36.0, 75.0, 51.0, 100.0),
    bp(76.0, 185.0, 101.0, 150.0),
    bp(186.0, 304.0, 151.0, 200.0),
    bp(305.0, 604.0, 201.0, 300.0),
    bp(605.0, 804.0, 301.0, 400.0),
    bp(805.0, 1004.0, 401.0, 500.0),
];
