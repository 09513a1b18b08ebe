use clap::{Arg, ArgAction, Command, value_parser};
use subsim::logging::{LogConfig, LogOutput, init_logging, level_from_verbosity, parse_log_level};
use subsim::models::{EnvironmentMode, TelemetrySnapshot};
use subsim::report;
use subsim::simulation::SimulationSession;
use tracing::info;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("subsim")
        .version("0.1.0")
        .about("潜水艇シミュレーション (Submarine Simulation)")
        .long_about("潜水艇船体の単一ステップ運動・流体力推定器\n\
                     シナリオを検証し、抵抗・浮力・トルク余裕と安全フラグを計算します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml / .json)のパスを指定")
        )
        .arg(
            Arg::new("steps")
                .short('n')
                .long("steps")
                .value_name("N")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("5")
                .help("実行するステップ数")
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_parser(["base", "real"])
                .default_value("base")
                .help("環境モード (base: ノイズなし, real: ノイズあり)")
        )
        .arg(
            Arg::new("noise")
                .long("noise")
                .value_parser(["on", "off"])
                .help("センサーノイズの上書き（モードより優先）")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("42")
                .help("ノイズ乱数のシード値")
        )
        .arg(
            Arg::new("report")
                .short('r')
                .long("report")
                .value_name("FILE")
                .help("CSVレポートの出力先")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");
    let level = match matches.get_one::<String>("log-level") {
        Some(level) => parse_log_level(level),
        None => level_from_verbosity(verbose_level),
    };
    let log_config = LogConfig {
        level,
        output: *matches.get_one::<LogOutput>("log-output").unwrap_or(&LogOutput::Console),
        ..LogConfig::default()
    };
    let _guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            None
        }
    };

    println!("潜水艇シミュレーション (Submarine Simulation) - subsim v0.1.0");
    println!();

    let Some(scenario_path) = matches.get_one::<String>("scenario") else {
        show_default_help();
        return;
    };

    let options = RunOptions {
        steps: *matches.get_one::<u32>("steps").unwrap_or(&5),
        mode: matches
            .get_one::<String>("mode")
            .and_then(|m| m.parse().ok())
            .unwrap_or_default(),
        noise_override: matches.get_one::<String>("noise").map(|v| v == "on"),
        seed: *matches.get_one::<u64>("seed").unwrap_or(&42),
        report: matches.get_one::<String>("report").cloned(),
        info_only: matches.get_flag("info"),
    };

    if let Err(e) = run_scenario(scenario_path, &options) {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// 実行オプション
struct RunOptions {
    steps: u32,
    mode: EnvironmentMode,
    noise_override: Option<bool>,
    seed: u64,
    report: Option<String>,
    info_only: bool,
}

/// シナリオファイルを読み込んで実行
fn run_scenario(scenario_path: &str, options: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = SimulationSession::new(options.seed);
    let scenario = session.load_file(scenario_path)?;

    scenario.print_summary();
    println!();

    if options.info_only {
        return Ok(());
    }

    session.set_environment_mode(options.mode);
    if let Some(enabled) = options.noise_override {
        session.set_noise_enabled(enabled);
    }

    let flags = session.flags();
    println!("=== シミュレーション設定 ===");
    println!("ステップ数: {}", options.steps);
    println!("環境モード: {}", flags.environment_mode);
    println!("センサーノイズ: {}", if flags.noise_enabled { "on" } else { "off" });
    println!("シード値: {}", options.seed);
    println!();

    let snapshots = session.advance(options.steps as usize)?;
    if let Some(last) = snapshots.last() {
        print_snapshot(last, flags.environment_mode);
    }

    if let Some(report_path) = &options.report {
        let rows = report::save_report(report_path, session.telemetry_rows())?;
        println!();
        println!("レポートを書き出しました: {} ({}行)", report_path, rows);
    }

    info!(steps = snapshots.len(), "シナリオ実行が正常に完了しました");
    Ok(())
}

/// 最終スナップショットと警報を表示
fn print_snapshot(snapshot: &TelemetrySnapshot, mode: EnvironmentMode) {
    println!("=== 最終テレメトリ ===");
    for (name, value) in snapshot.fields() {
        println!("{}: {}", name, value);
    }
    println!("environment_mode: {}", mode);

    let mut alerts = Vec::new();
    if snapshot.torque_limit_exceeded() {
        alerts.push("TORQUE LIMIT EXCEEDED");
    }
    if snapshot.cavitation_risk {
        alerts.push("CAVITATION RISK");
    }
    if snapshot.stability_warning {
        alerts.push("NEGATIVE GM - INSTABILITY");
    }
    println!(
        "警報: {}",
        if alerts.is_empty() { "なし".to_string() } else { alerts.join(", ") }
    );
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  subsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>  シナリオファイルを指定して実行");
    println!("  -n, --steps <N>        ステップ数 (既定: 5)");
    println!("  -m, --mode <MODE>      環境モード base / real");
    println!("      --noise <on|off>   センサーノイズの上書き");
    println!("      --seed <N>         乱数シード (既定: 42)");
    println!("  -r, --report <FILE>    CSVレポートを書き出し");
    println!("  -i, --info             シナリオ情報のみ表示");
    println!("  -v, --verbose          詳細出力 (複数指定で詳細レベル上昇)");
    println!("  -h, --help             このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/base_case.yaml       - 基準ケース（プロファイル0009、深度10m）");
    println!("  scenarios/shallow_sprint.yaml  - 浅深度・高速（キャビテーション確認用）");
    println!();
    println!("例:");
    println!("  subsim -s scenarios/base_case.yaml");
    println!("  subsim -s scenarios/base_case.yaml -m real -n 20 -r logs/report.csv");
    println!("  subsim -s scenarios/shallow_sprint.yaml -i");
}
