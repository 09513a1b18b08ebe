// 定数と数学ユーティリティ
pub mod common;

// 船体形状からの導出特性
pub mod hull;

// 物理ステップエンジン
pub mod physics;

// 環境モードとセッションフラグ
pub mod mode;

// 便利な re-export
pub use common::PhaseLimits;
pub use hull::HullProperties;
pub use mode::{EnvironmentMode, SessionFlags};
pub use physics::{PhysicsEngine, TelemetrySnapshot, TelemetryValue};
