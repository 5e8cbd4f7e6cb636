use std::fs;
use std::path::PathBuf;

use dxfview_config::{AppConfig, ConfigError};
use dxfview_engine::svg::SvgCanvas;
use dxfview_engine::view::{ViewTransform, render};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

enum Mode {
    Serve,
    Render { file: String, out: Option<PathBuf> },
}

fn main() {
    let mut args = std::env::args().skip(1);
    let mut mode = Mode::Serve;
    let mut config_override: Option<PathBuf> = None;
    let mut out_override: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--serve" => mode = Mode::Serve,
            "--render" => {
                let Some(file) = args.next() else {
                    eprintln!("`--render` 需要提供图纸的相对路径");
                    std::process::exit(1);
                };
                mode = Mode::Render { file, out: None };
            }
            "--out" => {
                let Some(path) = args.next() else {
                    eprintln!("`--out` 需要提供输出文件路径");
                    std::process::exit(1);
                };
                out_override = Some(PathBuf::from(path));
            }
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }
    if let Mode::Render { out, .. } = &mut mode {
        *out = out_override;
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 DXF 浏览服务");

    match mode {
        Mode::Serve => {
            info!(address = %config.server.bind_address(), "以 HTTP 服务模式启动");
            if let Err(err) = dxfview_server::run_blocking(config) {
                error!(error = %err, "HTTP 服务运行失败");
                std::process::exit(1);
            }
        }
        Mode::Render { file, out } => {
            info!(file = %file, "以单次渲染模式启动");
            if let Err(message) = render_file(&config, &file, out) {
                error!(error = %message, "渲染失败");
                std::process::exit(1);
            }
        }
    }
}

/// 加载、过滤并把图纸渲染为 SVG；未指定输出文件时写到标准输出。
fn render_file(config: &AppConfig, file: &str, out: Option<PathBuf>) -> Result<(), String> {
    let library = dxfview_server::library_from_config(&config.library);
    let document = library.load_and_filter(file).map_err(|err| err.to_string())?;

    let mut canvas = SvgCanvas::new(
        f64::from(config.viewer.width),
        f64::from(config.viewer.height),
    );
    let drawn = render(&document, &ViewTransform::default(), &mut canvas);
    let svg = canvas.finish();

    match out {
        Some(path) => {
            fs::write(&path, svg).map_err(|err| format!("写入 {} 失败: {err}", path.display()))?;
            info!(path = %path.display(), drawn, "SVG 已写出");
        }
        None => print!("{svg}"),
    }
    Ok(())
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_writer(std::io::stderr).with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
