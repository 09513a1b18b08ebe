use serde::Serialize;
use std::f64::consts::PI;

/// 船体の導出特性
///
/// 船体寸法から閉形式で求める前面投影面積と排水体積です。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HullProperties {
    /// 前面投影面積（m²、円形断面）
    pub area_m2: f64,
    /// 排水体積（m³、長楕円体近似）
    pub volume_m3: f64,
}

/// 前面投影面積 π·(d/2)²
pub fn frontal_area(diameter_m: f64) -> f64 {
    let radius = diameter_m / 2.0;
    PI * radius * radius
}

/// 排水体積 (4/3)·π·(L/2)·(d/2)²
pub fn displaced_volume(length_m: f64, diameter_m: f64) -> f64 {
    let a = length_m / 2.0;
    let b = diameter_m / 2.0;
    (4.0 / 3.0) * PI * a * b * b
}

/// 船体長と最大直径から導出特性を計算します
///
/// 入力は検証済み（正の有限値）であることを前提とし、エラーは返しません。
pub fn properties(length_m: f64, diameter_m: f64) -> HullProperties {
    HullProperties {
        area_m2: frontal_area(diameter_m),
        volume_m3: displaced_volume(length_m, diameter_m),
    }
}
