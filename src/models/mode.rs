use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 環境モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    /// 基準環境（センサーノイズなし）
    #[default]
    Base,
    /// 実環境（センサーノイズあり）
    Real,
}

impl EnvironmentMode {
    /// モードからノイズ有効フラグへの唯一の対応表
    pub fn noise_enabled(self) -> bool {
        match self {
            EnvironmentMode::Base => false,
            EnvironmentMode::Real => true,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            EnvironmentMode::Base => EnvironmentMode::Real,
            EnvironmentMode::Real => EnvironmentMode::Base,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvironmentMode::Base => "base",
            EnvironmentMode::Real => "real",
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(EnvironmentMode::Base),
            "real" => Ok(EnvironmentMode::Real),
            _ => Err(format!("無効な環境モード: {}. 利用可能: base, real", s)),
        }
    }
}

/// セッションのモードフラグ
///
/// `emergency_surface` は外部から観測されるだけの助言フラグで、計算には影響しません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionFlags {
    pub environment_mode: EnvironmentMode,
    /// モードとは独立に上書きできるノイズ有効フラグ
    pub noise_enabled: bool,
    pub emergency_surface: bool,
}

impl SessionFlags {
    /// モードを設定し、ノイズフラグをモードに同期させる
    pub fn set_environment_mode(&mut self, mode: EnvironmentMode) {
        self.environment_mode = mode;
        self.noise_enabled = mode.noise_enabled();
    }
}
