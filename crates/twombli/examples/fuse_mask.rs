use anyhow::Context;
use serde::Serialize;
use std::time::Instant;
use std::{fs::File, io::Write, path::PathBuf};
use twombli::builtin::HessianRidgeDetector;
use twombli::fusion::fuse_multiscale_with_trace;
use twombli::image::{load_source, mask_image, ridge_base};
use twombli::TwombliParams;

#[derive(Serialize)]
struct ScaleOut {
    line_width: u32,
    detected: usize,
    fused: usize,
}

#[derive(Serialize)]
struct FusionDump {
    image: String,
    width: u32,
    height: u32,
    foreground: usize,
    scales: Vec<ScaleOut>,
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let input: PathBuf = args
        .next()
        .context("usage: fuse_mask <image> [--min N] [--max N] [--dark]")?
        .into();

    let mut params = TwombliParams::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--min" | "--max" => {
                let v: u32 = args
                    .next()
                    .with_context(|| format!("expected an integer after {arg}"))?
                    .parse()
                    .with_context(|| format!("could not parse {arg} (use integer >= 1)"))?;
                if arg == "--min" {
                    params.minimum_line_width = v;
                } else {
                    params.maximum_line_width = v;
                }
            }
            "--dark" => params.dark_lines = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    params.validate()?;

    let source = load_source(&input)?;
    let base = ridge_base(&source, params.contrast_saturation);
    let (w, h) = (base.width() as usize, base.height() as usize);

    let started = Instant::now();
    let trace = fuse_multiscale_with_trace(
        base.as_raw(),
        w,
        h,
        &params.fusion_params(),
        &HessianRidgeDetector,
    )?;
    let fuse_ms = started.elapsed().as_secs_f64() * 1000.0;

    println!("image {}x{} pixels", base.width(), base.height());
    println!("fusion: {:7.2} ms", fuse_ms);
    for s in &trace.scales {
        println!(" - width {:2}: {:6} detected, {:6} fused", s.line_width, s.detected, s.fused);
    }

    let json_out = input.with_extension("fusion.json");
    let dump = FusionDump {
        image: input.to_string_lossy().into_owned(),
        width: base.width(),
        height: base.height(),
        foreground: trace.mask.count(),
        scales: trace
            .scales
            .iter()
            .map(|s| ScaleOut {
                line_width: s.line_width,
                detected: s.detected,
                fused: s.fused,
            })
            .collect(),
    };
    let mut json_file = File::create(&json_out)?;
    serde_json::to_writer_pretty(&mut json_file, &dump)?;
    json_file.write_all(b"\n")?;
    println!("Saved JSON dump to {}", json_out.display());

    let out = input.with_extension("mask.png");
    mask_image(&trace.mask).save(&out)?;
    println!("Saved mask to {}", out.display());

    Ok(())
}
