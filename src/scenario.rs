//! # Scenario モジュール
//!
//! シナリオ文書（YAML / JSON）を読み込み、型付きの `Scenario` に変換して検証します。
//!
//! 検証は2段階で行われます：
//!
//! 1. **フィールドレベル検証**: 型・値域のチェック（違反時は `InvalidScenario`）
//! 2. **フェーズレベル検証**: 深度500m・フィン角±35度の安全包絡線（違反時は `PhaseLimitExceeded`）
//!
//! フェーズレベル検証はフィールドレベル検証がすべて通った後にのみ実行されるため、
//! 呼び出し側は「不正な入力」と「形式は正しいが危険な入力」を区別できます。

use crate::models::common::{
    BASE_DRAG_COEFFICIENT, PROFILE_DRAG_PENALTY, PhaseLimits, REFERENCE_NACA_PROFILE,
};
use crate::models::hull::{self, HullProperties};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// 船体形状
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HullGeometry {
    pub length_m: f64,
    pub max_diameter_m: f64,
    /// 基準軸からのフィン位置（符号付き）
    pub fin_offset_x: f64,
    /// 抵抗係数ファミリーを選択するプロファイル識別子
    pub naca_profile: String,
    pub fin_surface_area_m2: f64,
}

impl HullGeometry {
    /// この船体の前面投影面積と排水体積
    pub fn properties(&self) -> HullProperties {
        hull::properties(self.length_m, self.max_diameter_m)
    }
}

/// 運動状態
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KinematicState {
    pub velocity_ms: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub depth_m: f64,
}

/// 操舵指令
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SteeringCommand {
    pub target_fin_angle_deg: f64,
    /// 利用可能なモータートルク（N·m）
    pub motor_torque_nm: f64,
}

/// 水中環境
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Environment {
    pub fluid_density_kgm3: f64,
    pub current_vector_ms: Vec<f64>,
    /// 相対ノイズ標準偏差
    pub sensor_noise_sigma: f64,
}

/// 完全なシナリオ
///
/// 検証に成功した場合にのみ生成され、読み込みごとに丸ごと置き換えられます。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Scenario {
    pub hull_geometry: HullGeometry,
    #[serde(alias = "physics_state")]
    pub kinematic_state: KinematicState,
    #[serde(alias = "steering_output")]
    pub steering_command: SteeringCommand,
    pub environment: Environment,
}

impl Scenario {
    /// シナリオファイルを読み込み、検証します
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        Self::parse(&contents)
    }

    /// 文書文字列を解析し、フィールドレベル→フェーズレベルの順に検証します
    pub fn parse(raw: &str) -> Result<Self, ScenarioError> {
        // セクション欠落や型不一致はここで検出される
        let scenario: Scenario = serde_yaml::from_str(raw)
            .map_err(|e| ScenarioError::InvalidScenario(format!("文書解析エラー: {}", e)))?;

        scenario.validate()?;
        scenario.validate_phase_limits(&PhaseLimits::default())?;

        Ok(scenario)
    }

    /// フィールドレベルの検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (name, value) in self.numeric_fields() {
            if !value.is_finite() {
                return Err(invalid(format!("{} must be finite", name)));
            }
        }

        let hg = &self.hull_geometry;
        let ks = &self.kinematic_state;
        let sc = &self.steering_command;
        let env = &self.environment;

        if hg.length_m <= 0.0 {
            return Err(invalid("length_m must be > 0"));
        }
        if hg.max_diameter_m <= 0.0 {
            return Err(invalid("max_diameter_m must be > 0"));
        }
        if hg.fin_surface_area_m2 <= 0.0 {
            return Err(invalid("fin_surface_area_m2 must be > 0"));
        }
        if ks.velocity_ms < 0.0 {
            return Err(invalid("velocity_ms must be >= 0"));
        }
        if ks.depth_m < 0.0 {
            return Err(invalid("depth_m must be >= 0"));
        }
        if sc.motor_torque_nm <= 0.0 {
            return Err(invalid("motor_torque_nm must be > 0"));
        }
        if env.current_vector_ms.len() != 3 {
            return Err(invalid(format!(
                "current_vector_ms must have 3 values (got {})",
                env.current_vector_ms.len()
            )));
        }
        if !(900.0..=1300.0).contains(&env.fluid_density_kgm3) {
            return Err(invalid(format!(
                "fluid_density_kgm3 {} out of range [900, 1300]",
                env.fluid_density_kgm3
            )));
        }
        if !(0.0..=0.1).contains(&env.sensor_noise_sigma) {
            return Err(invalid(format!(
                "sensor_noise_sigma {} out of range [0, 0.1]",
                env.sensor_noise_sigma
            )));
        }

        Ok(())
    }

    /// フェーズレベルの安全包絡線検証
    pub fn validate_phase_limits(&self, limits: &PhaseLimits) -> Result<(), ScenarioError> {
        let depth = self.kinematic_state.depth_m;
        if depth > limits.max_depth_m {
            return Err(ScenarioError::PhaseLimitExceeded(format!(
                "depth {}m exceeds Phase 1 limit ({}m)",
                depth, limits.max_depth_m
            )));
        }

        let angle = self.steering_command.target_fin_angle_deg;
        if angle.abs() > limits.max_fin_angle_deg {
            return Err(ScenarioError::PhaseLimitExceeded(format!(
                "target fin angle {}deg exceeds limit (+/-{}deg)",
                angle, limits.max_fin_angle_deg
            )));
        }

        Ok(())
    }

    /// NACAプロファイルに基づく抵抗係数
    ///
    /// 基準プロファイル "0009" は 0.20、それ以外は一律 0.03 を加算します。
    pub fn drag_coefficient(&self) -> f64 {
        if self.hull_geometry.naca_profile == REFERENCE_NACA_PROFILE {
            BASE_DRAG_COEFFICIENT
        } else {
            BASE_DRAG_COEFFICIENT + PROFILE_DRAG_PENALTY
        }
    }

    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        let hg = &self.hull_geometry;
        let ks = &self.kinematic_state;
        let sc = &self.steering_command;
        let env = &self.environment;

        let mut fields = vec![
            ("length_m", hg.length_m),
            ("max_diameter_m", hg.max_diameter_m),
            ("fin_offset_x", hg.fin_offset_x),
            ("fin_surface_area_m2", hg.fin_surface_area_m2),
            ("velocity_ms", ks.velocity_ms),
            ("pitch_deg", ks.pitch_deg),
            ("yaw_deg", ks.yaw_deg),
            ("depth_m", ks.depth_m),
            ("target_fin_angle_deg", sc.target_fin_angle_deg),
            ("motor_torque_nm", sc.motor_torque_nm),
            ("fluid_density_kgm3", env.fluid_density_kgm3),
            ("sensor_noise_sigma", env.sensor_noise_sigma),
        ];
        fields.extend(env.current_vector_ms.iter().map(|&c| ("current_vector_ms", c)));
        fields
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        let hg = &self.hull_geometry;
        let ks = &self.kinematic_state;
        let sc = &self.steering_command;
        let env = &self.environment;
        let props = hg.properties();

        println!("=== 船体形状 ===");
        println!("全長: {:.2}m / 最大直径: {:.2}m", hg.length_m, hg.max_diameter_m);
        println!("NACAプロファイル: {} (Cd = {:.2})", hg.naca_profile, self.drag_coefficient());
        println!("フィン位置: {:.2}m / フィン面積: {:.3}m²", hg.fin_offset_x, hg.fin_surface_area_m2);
        println!("前面投影面積: {:.4}m² / 排水体積: {:.4}m³", props.area_m2, props.volume_m3);
        println!();

        println!("=== 運動状態 ===");
        println!("速度: {:.2}m/s / 深度: {:.1}m", ks.velocity_ms, ks.depth_m);
        println!("ピッチ: {:.1}度 / ヨー: {:.1}度", ks.pitch_deg, ks.yaw_deg);
        println!();

        println!("=== 操舵指令 ===");
        println!("目標フィン角: {:.1}度 / モータートルク: {:.1}N·m", sc.target_fin_angle_deg, sc.motor_torque_nm);
        println!();

        println!("=== 環境 ===");
        println!("流体密度: {:.1}kg/m³", env.fluid_density_kgm3);
        println!("潮流: {:?} m/s", env.current_vector_ms);
        println!("センサーノイズσ: {:.3}", env.sensor_noise_sigma);
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn invalid(message: impl Into<String>) -> ScenarioError {
    ScenarioError::InvalidScenario(message.into())
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    /// フィールドレベルの構造・値域違反
    #[error("シナリオ検証エラー: {0}")]
    InvalidScenario(String),
    /// 形式は正しいが安全包絡線を超えている
    #[error("フェーズ制限超過: {0}")]
    PhaseLimitExceeded(String),
}
