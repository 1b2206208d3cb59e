/*
 * cea-demo.rs
 * -----------
 * Author: Chris Kennedy
 *
 * Small exercise binary for libcea: feeds either a file of compressed packets
 * or a built-in synthetic pop-on scenario through a `Context` and prints the
 * resulting captions. Stands in for the out-of-scope FFmpeg-bridging demo.
 */

use clap::Parser;
use libcea::args::Args;
use libcea::{CcChannel, Codec, Context, LiveEvent, Options, Packaging, Triplet};
use log::info;

fn build_options(args: &Args) -> Options {
    let services_708 = args
        .services_708
        .split(',')
        .filter_map(|s| s.trim().parse::<u8>().ok())
        .collect::<Vec<_>>();
    Options {
        cc_channel: if args.cc_channel == 2 { CcChannel::Cc2 } else { CcChannel::Cc1 },
        enable_708: args.enable_708,
        services_708: if services_708.is_empty() { vec![1] } else { services_708 },
        no_rollup: args.no_rollup,
        reorder_window: args.reorder_window,
    }
}

/// Feeds the scenario from §8 of the design notes: a pop-on "Test" caption.
fn run_synthetic_scenario(ctx: &mut Context) {
    let triplet = |marker: u8, b1: u8, b2: u8| Triplet::new(marker, b1, b2);
    ctx.feed(&[triplet(0x04, 0x94, 0x20)], 1000).unwrap(); // RCL
    ctx.feed(&[triplet(0x04, 0x54, 0xE5)], 1033).unwrap(); // Te
    ctx.feed(&[triplet(0x04, 0x73, 0xF4)], 1066).unwrap(); // st
    ctx.feed(&[triplet(0x04, 0x94, 0x2F)], 2000).unwrap(); // EOC
    for i in 0..30 {
        ctx.feed(&[triplet(0x04, 0x80, 0x80)], 2000 + i * 33).unwrap();
    }
    ctx.feed(&[triplet(0x04, 0x94, 0x2C)], 4000).unwrap(); // EDM
    for i in 0..30 {
        ctx.feed(&[triplet(0x04, 0x80, 0x80)], 4000 + i * 33).unwrap();
    }
    ctx.flush();
}

fn run_file_scenario(ctx: &mut Context, args: &Args) -> anyhow::Result<()> {
    let codec = if args.codec.eq_ignore_ascii_case("mpeg2") { Codec::Mpeg2 } else { Codec::H264 };
    let packaging = if args.packaging.eq_ignore_ascii_case("avcc") { Packaging::Avcc } else { Packaging::AnnexB };
    ctx.set_demuxer(codec, packaging, &[])?;

    let data = std::fs::read(&args.input_file)?;
    // No container framing is assumed here; the whole file is fed as one
    // packet with a synthetic PTS ramp, matching the 33ms-per-frame cadence
    // the scenario tests use.
    ctx.feed_packet(&data, 0)?;
    ctx.flush();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if !args.loglevel.is_empty() {
        std::env::set_var("RUST_LOG", &args.loglevel);
    }
    env_logger::init();

    let options = build_options(&args);
    let mut ctx = Context::new(options);

    if args.live_mode {
        ctx.set_caption_callback(Some(Box::new(|event: LiveEvent| match event {
            LiveEvent::Show { field, text, start_ms } => {
                println!("[show] field={field} start={start_ms}ms text={text:?}");
            }
            LiveEvent::Clear { field, end_ms } => {
                println!("[clear] field={field} end={end_ms}ms");
            }
        })));
    }

    if args.input_file.is_empty() {
        info!("no --input-file given, running the built-in synthetic pop-on scenario");
        run_synthetic_scenario(&mut ctx);
    } else {
        run_file_scenario(&mut ctx, &args)?;
    }

    if !args.live_mode {
        for caption in ctx.get_captions(64) {
            println!(
                "[{}/{}] {}ms - {}ms: {}",
                caption.info_tag, caption.mode_tag, caption.start_ms, caption.end_ms, caption.text
            );
        }
    }

    Ok(())
}
