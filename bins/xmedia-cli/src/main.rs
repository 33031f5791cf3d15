//! xmedia - 转码/转封装命令行工具
//!
//! 打开一个输入, 按命令行 (或 JSON 配置) 指定的编解码参数重新编码,
//! 或在 `-r` 模式下只转封装. Ctrl+C 会在当前数据包处理完后结束并写入尾部.

mod logging;

use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{debug, error, info};

use xmedia::{TranscodeOptions, Transcoder};
use xmedia_core::{StatusKind, TsMode};

const USAGE_NOTES: &str = "\
缩放策略 (-x):
  stretch    拉伸到目标尺寸
  aspect     等比缩放, 不足部分填充黑边 (默认)

时间戳策略 (-t):
  calculate  按墙钟流逝时间生成
  compute    按已写包数与帧率/采样率推算
  rescale    换算 pts/dts/时长到目标时间基, 位置交给复用器 (默认)
  round      只换算 pts/dts, 就近取整并保留无效标记
  source     保留源时间戳

元数据文件 (-m), 每行一条:
  HH:MM:SS|HH:MM:SS|章节标题
  字段名|字段值";

#[derive(Parser, Debug)]
#[command(
    name = "xmedia",
    version,
    about = "基于 FFmpeg 运行时的转码/转封装工具",
    after_help = USAGE_NOTES,
    disable_help_flag = true
)]
struct Cli {
    /// 输入 URL
    #[arg(short = 'i', long)]
    input: Option<String>,

    /// 输入格式名
    #[arg(short = 'e', long = "input-format")]
    input_format: Option<String>,

    /// 输出 URL
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// 输出格式名
    #[arg(short = 'f', long = "format")]
    output_format: Option<String>,

    /// 帧率 (num:den)
    #[arg(short = 'k', long = "frame-rate")]
    frame_rate: Option<String>,

    /// 元数据文件
    #[arg(short = 'm', long)]
    metadata: Option<String>,

    /// 时间戳策略
    #[arg(short = 't', long = "ts-mode")]
    ts_mode: Option<TsMode>,

    /// 音频编解码器名
    #[arg(short = 'a', long = "acodec")]
    audio_codec: Option<String>,

    /// 视频编解码器名
    #[arg(short = 'v', long = "vcodec")]
    video_codec: Option<String>,

    /// 缩放策略 (stretch / aspect)
    #[arg(short = 'x', long = "scale")]
    scale_policy: Option<String>,

    /// 像素格式名
    #[arg(short = 'p', long = "pix-fmt")]
    pixel_format: Option<String>,

    /// 采样格式名
    #[arg(short = 's', long = "sample-fmt")]
    sample_format: Option<String>,

    /// 采样率 (Hz)
    #[arg(short = 'q', long = "sample-rate")]
    sample_rate: Option<u32>,

    /// 声道数
    #[arg(short = 'c', long)]
    channels: Option<u32>,

    /// 自定义 I/O 缓冲区大小
    #[arg(short = 'b', long = "io-buffer")]
    io_buffer_size: Option<usize>,

    /// 输出宽度
    #[arg(short = 'w', long)]
    width: Option<u32>,

    /// 输出高度
    #[arg(short = 'h', long)]
    height: Option<u32>,

    /// 时间戳单调性修正增量, 0 表示关闭
    #[arg(short = 'n', long = "ts-fix")]
    ts_fix: Option<i64>,

    /// 通过自定义 I/O 写出
    #[arg(short = 'z', long = "custom-io")]
    custom_io: bool,

    /// 只转封装
    #[arg(short = 'r', long)]
    remux: bool,

    /// 调试输出
    #[arg(short = 'd', long)]
    debug: bool,

    /// 输入结束后从头循环
    #[arg(short = 'l', long = "loop")]
    looping: bool,

    /// JSON 配置文件, 命令行参数覆盖其中的同名项
    #[arg(long)]
    config: Option<String>,

    /// 同时写入日志文件 (logs/xmedia.*.log)
    #[arg(long = "log-file")]
    log_file: bool,

    /// 显示帮助
    #[arg(short = 'u', long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn into_options(self) -> Result<TranscodeOptions> {
        let mut opts = match self.config.as_deref() {
            Some(path) => TranscodeOptions::load_json(path)
                .with_context(|| format!("加载配置文件 '{path}' 失败"))?,
            None => TranscodeOptions::default(),
        };

        if let Some(v) = self.input {
            opts.input = v;
        }
        if let Some(v) = self.output {
            opts.output = v;
        }
        if let Some(v) = self.ts_mode {
            opts.ts_mode = v;
        }
        if let Some(v) = self.scale_policy {
            opts.scale_policy = v;
        }
        if let Some(v) = self.io_buffer_size {
            opts.io_buffer_size = v;
        }
        if let Some(v) = self.ts_fix {
            opts.ts_fix = v;
        }
        merge(&mut opts.input_format, self.input_format);
        merge(&mut opts.output_format, self.output_format);
        merge(&mut opts.frame_rate, self.frame_rate);
        merge(&mut opts.metadata_file, self.metadata);
        merge(&mut opts.audio_codec, self.audio_codec);
        merge(&mut opts.video_codec, self.video_codec);
        merge(&mut opts.pixel_format, self.pixel_format);
        merge(&mut opts.sample_format, self.sample_format);
        merge(&mut opts.sample_rate, self.sample_rate);
        merge(&mut opts.channels, self.channels);
        merge(&mut opts.width, self.width);
        merge(&mut opts.height, self.height);

        opts.custom_io |= self.custom_io;
        opts.remux |= self.remux;
        opts.debug |= self.debug;
        opts.looping |= self.looping;
        Ok(opts)
    }
}

fn merge<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn main() {
    let cli = Cli::parse();
    let verbosity = u8::from(cli.debug);
    if let Err(e) = logging::init("xmedia", verbosity, cli.log_file) {
        eprintln!("警告: {e:#}");
    }

    if let Err(e) = run(cli) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = cli.into_options()?;
    if options.input.is_empty() || options.output.is_empty() {
        anyhow::bail!("必须指定输入 (-i) 与输出 (-o), 使用 -u 查看帮助");
    }

    info!(
        "xmedia 版本 {} ({} -> {})",
        xmedia::version(),
        options.input,
        options.output
    );

    let status = xmedia_format::status_reporter(StatusKind::ALL, |kind, msg| {
        if kind.contains(StatusKind::ERROR) {
            error!("{msg}");
        } else if kind.contains(StatusKind::DEBUG) {
            debug!("{msg}");
        } else {
            info!("{msg}");
        }
    });

    let mut transcoder = Transcoder::new(options, status).context("创建流水线失败")?;
    let flag = transcoder.interrupt_flag();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, flag.clone())
            .with_context(|| format!("注册信号 {signal} 失败"))?;
    }

    transcoder.open().context("打开流水线失败")?;
    let summary = transcoder.run().context("处理失败")?;

    info!(
        "数据包 {} 个, 帧 {} 个, 跳过 {} 个, 循环 {} 次{}",
        summary.packets_read,
        summary.frames_decoded,
        summary.packets_skipped,
        summary.loops,
        if summary.interrupted { ", 已中断" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_notes_list_ts_modes() {
        let cases = [
            (TsMode::Calculate, "墙钟"),
            (TsMode::Compute, "包数"),
            (TsMode::Rescale, "(默认)"),
            (TsMode::Round, "只换算 pts/dts"),
            (TsMode::Source, "保留源时间戳"),
        ];
        for (mode, summary) in cases {
            let line = USAGE_NOTES
                .lines()
                .find(|l| l.trim_start().starts_with(mode.name()))
                .unwrap_or_else(|| panic!("缺少 {mode} 的说明"));
            assert!(line.contains(summary), "{line}");
        }
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "xmedia", "-i", "in.mp4", "-o", "out.ts", "-w", "640", "-h", "360", "-t", "source",
            "-n", "1", "-r", "-l",
        ])
        .unwrap();
        let opts = cli.into_options().unwrap();
        assert_eq!(opts.input, "in.mp4");
        assert_eq!(opts.width, Some(640));
        assert_eq!(opts.height, Some(360));
        assert_eq!(opts.ts_mode, TsMode::Source);
        assert_eq!(opts.ts_fix, 1);
        assert!(opts.remux);
        assert!(opts.looping);
    }

    #[test]
    fn test_config_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.json");
        std::fs::write(
            &path,
            r#"{"input":"a.mkv","output":"b.mkv","sampleRate":44100,"loop":true}"#,
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "xmedia",
            "--config",
            path.to_str().unwrap(),
            "-q",
            "48000",
        ])
        .unwrap();
        let opts = cli.into_options().unwrap();
        assert_eq!(opts.input, "a.mkv");
        assert_eq!(opts.sample_rate, Some(48000));
        assert!(opts.looping);
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["xmedia", "-u"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
