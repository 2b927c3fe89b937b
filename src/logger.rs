use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Timestamped stderr logging. `RUST_LOG` takes precedence over `debug`.
pub fn init(debug: bool) {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    let _ = Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
