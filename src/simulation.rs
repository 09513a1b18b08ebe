//! # Simulation モジュール
//!
//! シナリオを一度検証し、同じ条件で物理ステップをN回実行するセッションを提供します。
//!
//! ## 主要機能
//!
//! - **シナリオ読み込み**: 検証→船体特性の再計算→現在ケースの一括置き換え
//! - **ステップ実行**: 読み込み済みケースに対する物理ステップの繰り返し
//! - **テレメトリ記録**: 追記専用のスナップショットログ（各行の環境モード付き）
//! - **モードフラグ管理**: 環境モード、ノイズ上書き、緊急浮上要求
//!
//! 読み込みは原子的です。検証に失敗した場合、以前に読み込んだケースがそのまま有効です。
//! 乱数源はコンストラクタで注入されるため、同じシードからは同じ結果が得られます。
//!
//! ## 使用例
//!
//! ```no_run
//! use subsim::simulation::SimulationSession;
//! use subsim::models::EnvironmentMode;
//!
//! let mut session = SimulationSession::new(42);
//! session.load_file("scenarios/base_case.yaml")?;
//! session.set_environment_mode(EnvironmentMode::Real);
//! let snapshots = session.advance(5)?;
//! # Ok::<(), subsim::simulation::SessionError>(())
//! ```

use crate::models::{EnvironmentMode, HullProperties, PhysicsEngine, SessionFlags, TelemetrySnapshot};
use crate::scenario::{Scenario, ScenarioError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// セッションエラー
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// シナリオ未読み込みでの抵抗係数取得・ステップ実行
    #[error("シナリオが読み込まれていません")]
    NoScenarioLoaded,
}

/// 読み込み済みケース（シナリオと導出値の組）
#[derive(Debug, Clone)]
struct LoadedCase {
    scenario: Scenario,
    properties: HullProperties,
    drag_coefficient: f64,
}

impl LoadedCase {
    fn new(scenario: Scenario) -> Self {
        let properties = scenario.hull_geometry.properties();
        let drag_coefficient = scenario.drag_coefficient();
        Self {
            scenario,
            properties,
            drag_coefficient,
        }
    }
}

/// シミュレーションセッション
///
/// 生成時に必要なものをすべて受け取り、後から接続する手順はありません。
/// 内部同期は行わないため、複数スレッドから使う場合は呼び出し側で排他制御してください。
pub struct SimulationSession<R = ChaChaRng> {
    engine: PhysicsEngine,
    rng: R,
    current: Option<LoadedCase>,
    telemetry_log: Vec<TelemetrySnapshot>,
    mode_log: Vec<EnvironmentMode>,
    flags: SessionFlags,
}

impl SimulationSession<ChaChaRng> {
    /// シード値から既定の乱数源でセッションを作成
    pub fn new(seed: u64) -> Self {
        Self::with_rng(PhysicsEngine::default(), ChaChaRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SimulationSession<R> {
    /// エンジンと乱数源を指定してセッションを作成
    pub fn with_rng(engine: PhysicsEngine, rng: R) -> Self {
        Self {
            engine,
            rng,
            current: None,
            telemetry_log: Vec::new(),
            mode_log: Vec::new(),
            flags: SessionFlags::default(),
        }
    }

    /// シナリオファイルを読み込み、現在のケースを置き換えます
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&Scenario, SessionError> {
        let path = path.as_ref();
        let scenario = Scenario::from_file(path).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "シナリオ読み込み失敗");
        })?;
        info!(path = %path.display(), "シナリオファイル読み込み完了");
        Ok(self.install(scenario))
    }

    /// シナリオ文書を読み込み、現在のケースを置き換えます
    pub fn load(&mut self, raw: &str) -> Result<&Scenario, SessionError> {
        let scenario = Scenario::parse(raw).inspect_err(|e| {
            warn!(error = %e, "シナリオ読み込み失敗");
        })?;
        Ok(self.install(scenario))
    }

    /// 検証済みシナリオを現在のケースとして設定
    fn install(&mut self, scenario: Scenario) -> &Scenario {
        let case = LoadedCase::new(scenario);
        info!(
            naca_profile = %case.scenario.hull_geometry.naca_profile,
            area_m2 = case.properties.area_m2,
            volume_m3 = case.properties.volume_m3,
            drag_coefficient = case.drag_coefficient,
            "シナリオを読み込みました"
        );
        &self.current.insert(case).scenario
    }

    /// 現在のシナリオの抵抗係数
    pub fn drag_coefficient(&self) -> Result<f64, SessionError> {
        self.current
            .as_ref()
            .map(|case| case.drag_coefficient)
            .ok_or(SessionError::NoScenarioLoaded)
    }

    /// 物理ステップをn回実行し、新しいスナップショットを返します
    ///
    /// シナリオ未読み込みの場合は何も記録せずに `NoScenarioLoaded` を返します。
    pub fn advance(&mut self, n: usize) -> Result<Vec<TelemetrySnapshot>, SessionError> {
        let case = self.current.as_ref().ok_or(SessionError::NoScenarioLoaded)?;
        let noise_sigma = if self.flags.noise_enabled {
            case.scenario.environment.sensor_noise_sigma
        } else {
            0.0
        };
        let mode = self.flags.environment_mode;
        let start = self.telemetry_log.len();

        for _ in 0..n {
            let scenario = &case.scenario;
            let snapshot = self.engine.step(
                &scenario.kinematic_state,
                &scenario.environment,
                &scenario.steering_command,
                &scenario.hull_geometry,
                &case.properties,
                case.drag_coefficient,
                noise_sigma,
                &mut self.rng,
            );

            let step_index = self.telemetry_log.len();
            debug!(
                step = step_index,
                drag_force_n = snapshot.drag_force_n,
                effective_velocity_ms = snapshot.effective_velocity_ms,
                torque_margin_nm = snapshot.torque_margin_nm,
                "ステップ完了"
            );
            report_alerts(step_index, &snapshot);

            self.telemetry_log.push(snapshot);
            self.mode_log.push(mode);
        }

        info!(steps = n, total = self.telemetry_log.len(), mode = %mode, "シミュレーション実行完了");
        Ok(self.telemetry_log[start..].to_vec())
    }

    pub fn scenario(&self) -> Option<&Scenario> {
        self.current.as_ref().map(|case| &case.scenario)
    }

    pub fn hull_properties(&self) -> Option<HullProperties> {
        self.current.as_ref().map(|case| case.properties)
    }

    /// これまでに記録された全スナップショット
    pub fn snapshots(&self) -> &[TelemetrySnapshot] {
        &self.telemetry_log
    }

    /// スナップショットと記録時の環境モードの組
    pub fn telemetry_rows(&self) -> impl Iterator<Item = (&TelemetrySnapshot, EnvironmentMode)> {
        self.telemetry_log.iter().zip(self.mode_log.iter().copied())
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// 環境モードを設定（ノイズフラグも同期）
    pub fn set_environment_mode(&mut self, mode: EnvironmentMode) -> EnvironmentMode {
        self.flags.set_environment_mode(mode);
        debug!(mode = %mode, noise = self.flags.noise_enabled, "環境モード変更");
        mode
    }

    /// base と real を切り替え
    pub fn toggle_environment_mode(&mut self) -> EnvironmentMode {
        self.set_environment_mode(self.flags.environment_mode.toggled())
    }

    /// ノイズ有効フラグの上書き
    pub fn set_noise_enabled(&mut self, enabled: bool) {
        self.flags.noise_enabled = enabled;
    }

    /// 緊急浮上要求フラグを立てる（計算には影響しない）
    pub fn trigger_emergency_surface(&mut self) {
        self.flags.emergency_surface = true;
        warn!("緊急浮上が要求されました");
    }
}

fn report_alerts(step: usize, snapshot: &TelemetrySnapshot) {
    if snapshot.torque_limit_exceeded() {
        warn!(step, torque_margin_nm = snapshot.torque_margin_nm, "トルク上限超過");
    }
    if snapshot.cavitation_risk {
        warn!(step, effective_velocity_ms = snapshot.effective_velocity_ms, "キャビテーションの危険");
    }
    if snapshot.stability_warning {
        warn!(step, gm_m = snapshot.gm_m, "負のGM（不安定）");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::{document_with, reference_document};

    fn loaded_session(seed: u64, overrides: &[(&str, &str)]) -> SimulationSession {
        let mut session = SimulationSession::new(seed);
        session.load(&document_with(overrides)).unwrap();
        session
    }

    #[test]
    fn test_advance_before_load_fails() {
        let mut session = SimulationSession::new(0);
        assert!(matches!(session.advance(3), Err(SessionError::NoScenarioLoaded)));
        assert!(session.snapshots().is_empty());
        assert!(matches!(session.drag_coefficient(), Err(SessionError::NoScenarioLoaded)));
    }

    #[test]
    fn test_reference_scenario_end_to_end() {
        let mut session = SimulationSession::new(42);
        session.load(&reference_document()).unwrap();

        let props = session.hull_properties().unwrap();
        assert!((props.area_m2 - 0.1963).abs() < 1e-4);
        assert!((props.volume_m3 - 0.3927).abs() < 1e-4);
        assert_eq!(session.drag_coefficient().unwrap(), 0.20);

        let snapshots = session.advance(1).unwrap();
        assert_eq!(snapshots.len(), 1);
        let snap = snapshots[0];
        assert!((snap.drag_force_n - 0.5 * 1025.0 * 16.0 * 0.20 * props.area_m2).abs() < 1e-9);
        assert!((snap.buoyancy_force_n - 1025.0 * 9.81 * props.volume_m3).abs() < 1e-9);
        assert!(!snap.cavitation_risk);
        assert!((snap.gm_m - 0.07).abs() < 1e-12);
        assert!(!snap.stability_warning);
        assert_eq!(snap.torque_margin_nm, 50.0 - snap.torque_required_nm);
    }

    #[test]
    fn test_advance_appends_in_order() {
        let mut session = loaded_session(1, &[]);
        let first = session.advance(2).unwrap();
        let second = session.advance(3).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 3);
        assert_eq!(session.snapshots().len(), 5);
        assert_eq!(session.snapshots()[2..], second[..]);
    }

    #[test]
    fn test_advance_zero_steps() {
        let mut session = loaded_session(1, &[]);
        assert!(session.advance(0).unwrap().is_empty());
        assert!(session.snapshots().is_empty());
    }

    #[test]
    fn test_failed_load_keeps_previous_case() {
        let mut session = loaded_session(1, &[("velocity_ms", "3.0")]);

        let unsafe_depth = session.load(&document_with(&[("depth_m", "750.0")]));
        assert!(matches!(
            unsafe_depth,
            Err(SessionError::Scenario(ScenarioError::PhaseLimitExceeded(_)))
        ));
        let malformed = session.load("hull_geometry: 12");
        assert!(matches!(
            malformed,
            Err(SessionError::Scenario(ScenarioError::InvalidScenario(_)))
        ));

        assert_eq!(session.scenario().unwrap().kinematic_state.velocity_ms, 3.0);
        let snap = session.advance(1).unwrap()[0];
        assert_eq!(snap.effective_velocity_ms, 3.0);
    }

    #[test]
    fn test_reload_replaces_case_and_geometry() {
        let mut session = loaded_session(1, &[]);
        session
            .load(&document_with(&[("max_diameter_m", "1.0"), ("naca_profile", "0012")]))
            .unwrap();
        let props = session.hull_properties().unwrap();
        assert!((props.area_m2 - std::f64::consts::PI * 0.25).abs() < 1e-12);
        assert!((session.drag_coefficient().unwrap() - 0.23).abs() < 1e-12);
    }

    #[test]
    fn test_base_mode_ignores_scenario_sigma() {
        let mut session = loaded_session(9, &[("sensor_noise_sigma", "0.1")]);
        let snapshots = session.advance(10).unwrap();
        assert!(snapshots.iter().all(|s| s.effective_velocity_ms == 4.0));
    }

    #[test]
    fn test_real_mode_resamples_noise_per_step() {
        let mut session = loaded_session(9, &[("sensor_noise_sigma", "0.1")]);
        session.set_environment_mode(EnvironmentMode::Real);
        let snapshots = session.advance(10).unwrap();
        assert!(snapshots.iter().any(|s| s.effective_velocity_ms != 4.0));
        assert!(snapshots.windows(2).any(|w| w[0].effective_velocity_ms != w[1].effective_velocity_ms));
    }

    #[test]
    fn test_noise_override_in_real_mode() {
        let mut session = loaded_session(9, &[("sensor_noise_sigma", "0.1")]);
        session.set_environment_mode(EnvironmentMode::Real);
        session.set_noise_enabled(false);
        let snapshots = session.advance(5).unwrap();
        assert!(snapshots.iter().all(|s| s.effective_velocity_ms == 4.0));
    }

    #[test]
    fn test_same_seed_same_telemetry() {
        let run = |seed: u64| {
            let mut session = loaded_session(seed, &[("sensor_noise_sigma", "0.05")]);
            session.toggle_environment_mode();
            session.advance(8).unwrap()
        };
        assert_eq!(run(77), run(77));
        assert_ne!(run(77), run(78));
    }

    #[test]
    fn test_telemetry_rows_record_mode_per_step() {
        let mut session = loaded_session(2, &[]);
        session.advance(1).unwrap();
        session.toggle_environment_mode();
        session.advance(2).unwrap();

        let modes: Vec<EnvironmentMode> = session.telemetry_rows().map(|(_, mode)| mode).collect();
        assert_eq!(
            modes,
            vec![EnvironmentMode::Base, EnvironmentMode::Real, EnvironmentMode::Real]
        );
    }

    #[test]
    fn test_emergency_surface_is_advisory() {
        let mut session = loaded_session(5, &[]);
        let before = session.advance(1).unwrap()[0];
        session.trigger_emergency_surface();
        assert!(session.flags().emergency_surface);
        let after = session.advance(1).unwrap()[0];
        assert_eq!(before, after);
    }

    #[test]
    fn test_shallow_fast_scenario_flags_cavitation() {
        let mut session = loaded_session(
            3,
            &[("depth_m", "1.5"), ("velocity_ms", "5.0"), ("current_vector_ms", "[0.0, 0.0, 1.0]")],
        );
        let snap = session.advance(1).unwrap()[0];
        assert_eq!(snap.effective_velocity_ms, 6.0);
        assert!(snap.cavitation_risk);
    }
}
