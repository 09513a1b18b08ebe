use crate::models::common::{
    CAVITATION_DEPTH_M, CAVITATION_VELOCITY_MS, GRAVITY_MS2, NOISE_VELOCITY_FLOOR, PhaseLimits,
    math_utils,
};
use crate::models::hull::HullProperties;
use crate::scenario::{Environment, HullGeometry, KinematicState, SteeringCommand};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;
use tracing::trace;

/// 1ステップ分のテレメトリ
///
/// フィールド順はCSV出力の列順と一致します。生成後に変更されることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub drag_force_n: f64,
    pub buoyancy_force_n: f64,
    /// ノイズ注入後の有効速度
    pub effective_velocity_ms: f64,
    pub torque_required_nm: f64,
    pub torque_margin_nm: f64,
    pub cavitation_risk: bool,
    /// メタセンタ高さの簡易指標
    pub gm_m: f64,
    pub stability_warning: bool,
}

/// テレメトリ値（表形式出力用）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryValue {
    Number(f64),
    Flag(bool),
}

impl std::fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryValue::Number(value) => write!(f, "{}", value),
            TelemetryValue::Flag(flag) => write!(f, "{}", flag),
        }
    }
}

impl TelemetrySnapshot {
    /// 列名（フィールド定義順）
    pub const FIELD_NAMES: [&'static str; 8] = [
        "drag_force_n",
        "buoyancy_force_n",
        "effective_velocity_ms",
        "torque_required_nm",
        "torque_margin_nm",
        "cavitation_risk",
        "gm_m",
        "stability_warning",
    ];

    /// フィールド名と値の組（フィールド定義順）
    pub fn fields(&self) -> [(&'static str, TelemetryValue); 8] {
        use TelemetryValue::{Flag, Number};
        let names = Self::FIELD_NAMES;
        [
            (names[0], Number(self.drag_force_n)),
            (names[1], Number(self.buoyancy_force_n)),
            (names[2], Number(self.effective_velocity_ms)),
            (names[3], Number(self.torque_required_nm)),
            (names[4], Number(self.torque_margin_nm)),
            (names[5], Flag(self.cavitation_risk)),
            (names[6], Number(self.gm_m)),
            (names[7], Flag(self.stability_warning)),
        ]
    }

    /// モーターが指令旋回を実現できないか
    pub fn torque_limit_exceeded(&self) -> bool {
        self.torque_margin_nm < 0.0
    }
}

/// 物理ステップエンジン
///
/// 状態を持たない純粋な計算器です。ノイズ以外は決定的で、乱数源は呼び出し側から
/// 注入されます。入力は検証済みであることを前提とし、再チェックは行いません。
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    /// 重力加速度（m/s²）
    pub gravity: f64,
    /// 操舵角比の基準となる安全包絡線
    pub limits: PhaseLimits,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(GRAVITY_MS2)
    }
}

impl PhysicsEngine {
    pub fn new(gravity: f64) -> Self {
        Self {
            gravity,
            limits: PhaseLimits::default(),
        }
    }

    /// 二乗抵抗則 0.5·ρ·v²·Cd·A
    pub fn calculate_drag(
        &self,
        velocity_ms: f64,
        drag_coefficient: f64,
        area_m2: f64,
        density_kgm3: f64,
    ) -> f64 {
        0.5 * density_kgm3 * velocity_ms * velocity_ms * drag_coefficient * area_m2
    }

    /// アルキメデスの浮力 ρ·g·V
    pub fn calculate_buoyancy(&self, volume_m3: f64, density_kgm3: f64) -> f64 {
        density_kgm3 * self.gravity * volume_m3
    }

    /// 潮流を前進速度に加算した有効速度（負にはならない）
    pub fn effective_velocity(&self, velocity_ms: f64, current_vector_ms: &[f64]) -> f64 {
        let current_magnitude = math_utils::magnitude(current_vector_ms);
        (velocity_ms + current_magnitude).max(0.0)
    }

    /// 相対ガウスノイズの注入
    ///
    /// 標準偏差は `sigma × max(|value|, 1e-6)`。`sigma <= 0` なら値をそのまま返します。
    pub fn apply_sensor_noise<R: Rng + ?Sized>(&self, value: f64, sigma: f64, rng: &mut R) -> f64 {
        if sigma <= 0.0 {
            return value;
        }
        let std_dev = sigma * value.abs().max(NOISE_VELOCITY_FLOOR);
        let z: f64 = StandardNormal.sample(rng);
        value + std_dev * z
    }

    /// 操舵実現性の評価
    ///
    /// # 戻り値
    ///
    /// (必要トルク, トルク余裕)
    pub fn evaluate_steering_feasibility(
        &self,
        drag_force_n: f64,
        target_fin_angle_deg: f64,
        fin_offset_m: f64,
        motor_torque_nm: f64,
    ) -> (f64, f64) {
        let angle_ratio =
            math_utils::saturating_ratio(target_fin_angle_deg, self.limits.max_fin_angle_deg);
        let torque_required = drag_force_n * fin_offset_m.abs() * angle_ratio;
        (torque_required, motor_torque_nm - torque_required)
    }

    /// 浅深度かつ高速ならキャビテーションの危険あり（境界値は false）
    pub fn cavitation_check(&self, depth_m: f64, velocity_ms: f64) -> bool {
        depth_m < CAVITATION_DEPTH_M && velocity_ms > CAVITATION_VELOCITY_MS
    }

    /// メタセンタ高さの線形プレースホルダー
    pub fn stability_check(&self, length_m: f64, diameter_m: f64) -> f64 {
        (diameter_m * 0.2) - (length_m * 0.01)
    }

    /// 1ステップ分の計算
    #[allow(clippy::too_many_arguments)]
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: &KinematicState,
        environment: &Environment,
        steering: &SteeringCommand,
        hull: &HullGeometry,
        properties: &HullProperties,
        drag_coefficient: f64,
        noise_sigma: f64,
        rng: &mut R,
    ) -> TelemetrySnapshot {
        let effective = self.effective_velocity(state.velocity_ms, &environment.current_vector_ms);
        let noisy_velocity = self.apply_sensor_noise(effective, noise_sigma, rng);

        let density = environment.fluid_density_kgm3;
        let drag = self.calculate_drag(noisy_velocity, drag_coefficient, properties.area_m2, density);
        let buoyancy = self.calculate_buoyancy(properties.volume_m3, density);

        let (torque_required, torque_margin) = self.evaluate_steering_feasibility(
            drag,
            steering.target_fin_angle_deg,
            hull.fin_offset_x,
            steering.motor_torque_nm,
        );

        let gm_m = self.stability_check(hull.length_m, hull.max_diameter_m);

        trace!(
            effective,
            noisy_velocity, drag, buoyancy, torque_required, "物理ステップ計算"
        );

        TelemetrySnapshot {
            drag_force_n: drag,
            buoyancy_force_n: buoyancy,
            effective_velocity_ms: noisy_velocity,
            torque_required_nm: torque_required,
            torque_margin_nm: torque_margin,
            cavitation_risk: self.cavitation_check(state.depth_m, noisy_velocity),
            gm_m,
            stability_warning: gm_m < 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hull;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn hull_geometry(length_m: f64, diameter_m: f64, fin_offset_x: f64) -> HullGeometry {
        HullGeometry {
            length_m,
            max_diameter_m: diameter_m,
            fin_offset_x,
            naca_profile: "0009".to_string(),
            fin_surface_area_m2: 0.08,
        }
    }

    fn state(velocity_ms: f64, depth_m: f64) -> KinematicState {
        KinematicState {
            velocity_ms,
            pitch_deg: 0.0,
            yaw_deg: 0.0,
            depth_m,
        }
    }

    fn environment(density: f64, current: [f64; 3], sigma: f64) -> Environment {
        Environment {
            fluid_density_kgm3: density,
            current_vector_ms: current.to_vec(),
            sensor_noise_sigma: sigma,
        }
    }

    fn steering(angle: f64, torque: f64) -> SteeringCommand {
        SteeringCommand {
            target_fin_angle_deg: angle,
            motor_torque_nm: torque,
        }
    }

    #[test]
    fn test_reference_step() {
        let engine = PhysicsEngine::default();
        let hull = hull_geometry(3.0, 0.5, 1.0);
        let props = hull.properties();
        let mut rng = ChaChaRng::seed_from_u64(42);

        let snap = engine.step(
            &state(4.0, 10.0),
            &environment(1025.0, [0.0, 0.0, 0.0], 0.0),
            &steering(10.0, 50.0),
            &hull,
            &props,
            0.20,
            0.0,
            &mut rng,
        );

        let expected_drag = 0.5 * 1025.0 * 16.0 * 0.20 * props.area_m2;
        assert_eq!(snap.drag_force_n, expected_drag);
        assert!((snap.drag_force_n - 322.0).abs() < 0.5);
        let expected_buoyancy = 1025.0 * 9.81 * props.volume_m3;
        assert_eq!(snap.buoyancy_force_n, expected_buoyancy);
        assert!((snap.buoyancy_force_n - 3948.0).abs() < 2.0);
        assert_eq!(snap.effective_velocity_ms, 4.0);
        assert!(!snap.cavitation_risk);
        assert!((snap.gm_m - 0.07).abs() < 1e-12);
        assert!(!snap.stability_warning);
        assert!((snap.torque_required_nm - expected_drag * (10.0 / 35.0)).abs() < 1e-9);
        assert!(snap.torque_limit_exceeded());
    }

    #[test]
    fn test_effective_velocity_without_noise_is_exact() {
        let engine = PhysicsEngine::default();
        let hull = hull_geometry(3.0, 0.5, 1.0);
        let props = hull.properties();
        let mut rng = ChaChaRng::seed_from_u64(7);

        for (velocity, current) in [(0.0, [3.0, 4.0, 0.0]), (2.5, [0.0, 0.0, 1.5]), (1.0, [0.0; 3])] {
            let snap = engine.step(
                &state(velocity, 50.0),
                &environment(1000.0, current, 0.1),
                &steering(0.0, 10.0),
                &hull,
                &props,
                0.2,
                0.0,
                &mut rng,
            );
            assert_eq!(
                snap.effective_velocity_ms,
                velocity + math_utils::magnitude(&current)
            );
        }
    }

    #[test]
    fn test_noise_is_reproducible_for_fixed_seed() {
        let engine = PhysicsEngine::default();
        let mut rng_a = ChaChaRng::seed_from_u64(1234);
        let mut rng_b = ChaChaRng::seed_from_u64(1234);

        let a: Vec<f64> = (0..20).map(|_| engine.apply_sensor_noise(4.0, 0.05, &mut rng_a)).collect();
        let b: Vec<f64> = (0..20).map(|_| engine.apply_sensor_noise(4.0, 0.05, &mut rng_b)).collect();
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 4.0));
    }

    #[test]
    fn test_noise_statistics_are_relative() {
        let engine = PhysicsEngine::default();
        let mut rng = ChaChaRng::seed_from_u64(42);

        let samples: Vec<f64> = (0..2000)
            .map(|_| engine.apply_sensor_noise(10.0, 0.05, &mut rng))
            .collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance =
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;

        assert!((mean - 10.0).abs() < 0.1, "mean {} should be close to 10.0", mean);
        assert!((variance.sqrt() - 0.5).abs() < 0.1, "std dev {} should be close to 0.5", variance.sqrt());
    }

    #[test]
    fn test_noise_floor_at_zero_velocity() {
        let engine = PhysicsEngine::default();
        let mut rng = ChaChaRng::seed_from_u64(3);
        let noisy = engine.apply_sensor_noise(0.0, 0.1, &mut rng);
        assert!(noisy.is_finite());
        assert!(noisy.abs() < 1e-5);
    }

    #[test]
    fn test_zero_sigma_passes_through() {
        let engine = PhysicsEngine::default();
        let mut rng = ChaChaRng::seed_from_u64(3);
        assert_eq!(engine.apply_sensor_noise(6.5, 0.0, &mut rng), 6.5);
    }

    #[test]
    fn test_drag_monotonic_in_velocity_and_density() {
        let engine = PhysicsEngine::default();
        let area = hull::frontal_area(0.5);

        let mut previous = -1.0;
        for velocity in [0.0, 0.5, 1.0, 4.0, 9.0] {
            let drag = engine.calculate_drag(velocity, 0.2, area, 1025.0);
            assert!(drag >= previous);
            previous = drag;
        }

        let mut previous = -1.0;
        for density in [900.0, 1000.0, 1025.0, 1300.0] {
            let drag = engine.calculate_drag(4.0, 0.2, area, density);
            assert!(drag >= previous);
            previous = drag;
        }
    }

    #[test]
    fn test_torque_margin_identity() {
        let engine = PhysicsEngine::default();
        for (drag, angle, offset, torque) in [
            (321.9, 10.0, 1.0, 50.0),
            (10.0, -40.0, -0.7, 5.0),
            (0.0, 0.0, 2.0, 1.0),
            (1234.5, 35.0, 0.3, 600.0),
        ] {
            let (required, margin) = engine.evaluate_steering_feasibility(drag, angle, offset, torque);
            assert_eq!(margin, torque - required);
            assert!(required >= 0.0);
        }
    }

    #[test]
    fn test_angle_ratio_saturates() {
        let engine = PhysicsEngine::default();
        let (at_limit, _) = engine.evaluate_steering_feasibility(100.0, 35.0, 1.0, 10.0);
        let (beyond, _) = engine.evaluate_steering_feasibility(100.0, -50.0, 1.0, 10.0);
        assert_eq!(at_limit, 100.0);
        assert_eq!(beyond, 100.0);
    }

    #[test]
    fn test_cavitation_thresholds() {
        let engine = PhysicsEngine::default();
        assert!(engine.cavitation_check(1.0, 5.5));
        assert!(!engine.cavitation_check(2.0, 5.5));
        assert!(!engine.cavitation_check(1.0, 5.0));
        assert!(!engine.cavitation_check(10.0, 20.0));
    }

    #[test]
    fn test_stability_warning_for_slender_hull() {
        let engine = PhysicsEngine::default();
        let hull = hull_geometry(30.0, 1.0, 1.0);
        let props = hull.properties();
        let mut rng = ChaChaRng::seed_from_u64(0);
        let snap = engine.step(
            &state(1.0, 10.0),
            &environment(1000.0, [0.0; 3], 0.0),
            &steering(0.0, 10.0),
            &hull,
            &props,
            0.2,
            0.0,
            &mut rng,
        );
        assert!(snap.gm_m < 0.0);
        assert!(snap.stability_warning);
    }

    #[test]
    fn test_fields_follow_declaration_order() {
        let snap = TelemetrySnapshot {
            drag_force_n: 1.0,
            buoyancy_force_n: 2.0,
            effective_velocity_ms: 3.0,
            torque_required_nm: 4.0,
            torque_margin_nm: 5.0,
            cavitation_risk: true,
            gm_m: 6.0,
            stability_warning: false,
        };
        let fields = snap.fields();
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, TelemetrySnapshot::FIELD_NAMES.to_vec());
        assert_eq!(fields[5].1, TelemetryValue::Flag(true));
        assert_eq!(fields[6].1, TelemetryValue::Number(6.0));
    }
}
