use clap::Parser;

/// libcea demo configuration
#[derive(Parser, Debug, Clone)]
#[clap(
    author = "Chris Kennedy",
    version = "0.1.0",
    about = "ATSC A/53 closed-caption extraction demo"
)]
pub struct Args {
    /// Input file to read compressed packets or raw cc_data from.
    #[clap(
        long,
        env = "INPUT_FILE",
        default_value = "",
        help = "Input file path; empty runs the built-in synthetic scenario."
    )]
    pub input_file: String,

    /// Codec of the input file.
    #[clap(
        long,
        env = "CODEC",
        default_value = "h264",
        help = "Container codec: h264 or mpeg2."
    )]
    pub codec: String,

    /// H.264 packaging.
    #[clap(
        long,
        env = "PACKAGING",
        default_value = "annexb",
        help = "H.264 NAL packaging: annexb or avcc."
    )]
    pub packaging: String,

    /// 608 channel to decode.
    #[clap(long, env = "CC_CHANNEL", default_value_t = 1, help = "608 channel: 1 or 2.")]
    pub cc_channel: u8,

    /// Enable 708 decoding.
    #[clap(long, env = "ENABLE_708", default_value_t = true, help = "Enable CEA-708 decoding.")]
    pub enable_708: bool,

    /// Comma-separated 708 service numbers to decode.
    #[clap(
        long,
        env = "SERVICES_708",
        default_value = "1",
        help = "Comma-separated 708 service numbers (1-63) to decode."
    )]
    pub services_708: String,

    /// Disable roll-up accumulation (emit one line at a time).
    #[clap(long, env = "NO_ROLLUP", default_value_t = false, help = "Emit roll-up captions one line at a time.")]
    pub no_rollup: bool,

    /// Reorder window override (0 = auto).
    #[clap(long, env = "REORDER_WINDOW", default_value_t = 0, help = "Reorder window override, 0 = auto.")]
    pub reorder_window: u8,

    /// Use the live callback delivery mode instead of pull mode.
    #[clap(long, env = "LIVE_MODE", default_value_t = false, help = "Use live callback delivery instead of pull mode.")]
    pub live_mode: bool,

    /// Loglevel, control rust log level.
    #[clap(long, env = "LOGLEVEL", default_value = "info", help = "Loglevel, control rust log level.")]
    pub loglevel: String,
}
