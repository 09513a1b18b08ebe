//! # subsim
//!
//! 潜水艇船体の単一ステップ運動・流体力推定器です。
//!
//! シナリオ（船体寸法、運動状態、操舵指令、水中環境）を検証し、1ティック分の
//! 抵抗・浮力・トルク余裕と、キャビテーション危険・安定性警告の2つのフラグを計算します。

pub mod logging;
pub mod models;
pub mod report;
pub mod scenario;
pub mod simulation;

pub use models::{EnvironmentMode, HullProperties, PhysicsEngine, TelemetrySnapshot};
pub use scenario::{Scenario, ScenarioError};
pub use simulation::{SessionError, SimulationSession};
