/// 重力加速度（m/s²）
pub const GRAVITY_MS2: f64 = 9.81;

/// 基準NACAプロファイル（抵抗ペナルティなし）
pub const REFERENCE_NACA_PROFILE: &str = "0009";

/// 基本抵抗係数
pub const BASE_DRAG_COEFFICIENT: f64 = 0.20;

/// 基準外プロファイルに加算する抵抗係数
pub const PROFILE_DRAG_PENALTY: f64 = 0.03;

/// キャビテーション判定の深度閾値（m、未満で浅い）
pub const CAVITATION_DEPTH_M: f64 = 2.0;

/// キャビテーション判定の速度閾値（m/s、超過で高速）
pub const CAVITATION_VELOCITY_MS: f64 = 5.0;

/// ノイズ標準偏差の下限（速度ゼロ付近での退化防止）
pub const NOISE_VELOCITY_FLOOR: f64 = 1e-6;

/// フェーズ1の安全包絡線
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseLimits {
    /// 最大深度（m）
    pub max_depth_m: f64,
    /// 最大フィン角（度、絶対値）
    pub max_fin_angle_deg: f64,
}

impl Default for PhaseLimits {
    fn default() -> Self {
        Self {
            max_depth_m: 500.0,
            max_fin_angle_deg: 35.0,
        }
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// ベクトルのユークリッドノルム
    pub fn magnitude(components: &[f64]) -> f64 {
        components.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    /// 角度比（|angle| / limit を 1.0 で飽和）
    pub fn saturating_ratio(angle_deg: f64, limit_deg: f64) -> f64 {
        (angle_deg.abs() / limit_deg).min(1.0)
    }
}
