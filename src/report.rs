//! # Report モジュール
//!
//! テレメトリログをCSV形式で書き出します。列はスナップショットのフィールド順に
//! `environment_mode` 列を加えたものです。ログが空の場合は空ファイルを書き出します。

use crate::models::{EnvironmentMode, TelemetrySnapshot};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// 環境モード列の列名
pub const ENVIRONMENT_MODE_COLUMN: &str = "environment_mode";

/// 任意の出力先へCSVを書き込み
pub fn write_csv<'a, W, I>(writer: &mut W, rows: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a TelemetrySnapshot, EnvironmentMode)>,
{
    let mut count = 0;

    for (snapshot, mode) in rows {
        if count == 0 {
            let mut header: Vec<&str> = TelemetrySnapshot::FIELD_NAMES.to_vec();
            header.push(ENVIRONMENT_MODE_COLUMN);
            writeln!(writer, "{}", header.join(","))?;
        }

        let mut cells: Vec<String> = snapshot
            .fields()
            .iter()
            .map(|(_, value)| value.to_string())
            .collect();
        cells.push(mode.to_string());
        writeln!(writer, "{}", cells.join(","))?;

        count += 1;
    }

    Ok(count)
}

/// CSVレポートをファイルへ保存（親ディレクトリは必要に応じて作成）
pub fn save_report<'a, P, I>(path: P, rows: I) -> io::Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a TelemetrySnapshot, EnvironmentMode)>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let count = write_csv(&mut writer, rows)?;
    writer.flush()?;

    info!(path = %path.display(), rows = count, "レポートを書き出しました");
    Ok(count)
}
